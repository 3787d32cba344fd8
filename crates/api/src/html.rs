// Server-rendered form pages

use std::collections::HashMap;
use std::fmt::Write;

use gpc_models::{FieldSpec, MixPrediction, PropertyPrediction, CLOGGING_FIELDS, MIX_FIELDS};

pub const APP_TITLE: &str = "Geopolymer Pervious Concrete – Property Prediction";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Mix,
    Clogging,
}

impl Page {
    pub fn heading(self) -> &'static str {
        match self {
            Self::Mix => APP_TITLE,
            Self::Clogging => "Clogging Rate Prediction for Geopolymer Pervious Concrete",
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            Self::Mix => "/predict",
            Self::Clogging => "/clogging",
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Self::Mix => &MIX_FIELDS,
            Self::Clogging => &CLOGGING_FIELDS,
        }
    }
}

pub enum Outcome<'a> {
    Blank,
    Mix(&'a MixPrediction),
    Clogging(&'a PropertyPrediction),
    Error(String),
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn format_default(spec: &FieldSpec) -> String {
    if spec.integer {
        format!("{}", spec.default.round())
    } else {
        format!("{}", spec.default)
    }
}

fn metric(out: &mut String, prediction: &PropertyPrediction) {
    let label = if prediction.unit.is_empty() {
        prediction.target.label().to_string()
    } else {
        format!("{} ({})", prediction.target.label(), prediction.unit)
    };
    let _ = write!(
        out,
        r#"<div class="metric"><div class="metric-label">{}</div><div class="metric-value">{}</div></div>"#,
        escape(&label),
        prediction.display_value()
    );
}

/// Full page: one number input per field, prefilled from `values` (the
/// submitted form) or the field default, followed by the outcome.
pub fn render_page(page: Page, values: &HashMap<String, String>, outcome: &Outcome<'_>) -> String {
    let mut out = String::with_capacity(4096);
    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; }}
label {{ display: block; margin-top: 0.8rem; }}
input {{ width: 100%; padding: 0.3rem; }}
.metrics {{ display: flex; gap: 2rem; margin-top: 1.5rem; }}
.metric-value {{ font-size: 1.8rem; }}
.error {{ color: #b00020; margin-top: 1rem; }}
</style>
</head>
<body>
<nav><a href="/">Property prediction</a> | <a href="/clogging">Clogging rate</a></nav>
<h1>{heading}</h1>
<form method="post" action="{action}">
"#,
        title = escape(APP_TITLE),
        heading = escape(page.heading()),
        action = page.action(),
    );

    for spec in page.fields() {
        let value = values
            .get(spec.column)
            .cloned()
            .unwrap_or_else(|| format_default(spec));
        let _ = writeln!(
            out,
            r#"<label for="{col}">{label}</label><input type="number" id="{col}" name="{col}" min="{min}" max="{max}" step="{step}" value="{value}" required>"#,
            col = spec.column,
            label = escape(&spec.display_label()),
            min = spec.min,
            max = spec.max,
            step = spec.step,
            value = escape(&value),
        );
    }

    let button = match page {
        Page::Mix => "Predict",
        Page::Clogging => "Predict Clogging Rate",
    };
    let _ = writeln!(out, r#"<p><button type="submit">{button}</button></p>"#);
    out.push_str("</form>\n");

    match outcome {
        Outcome::Blank => {}
        Outcome::Mix(result) => {
            out.push_str(r#"<div class="metrics">"#);
            for prediction in result.iter() {
                metric(&mut out, prediction);
            }
            out.push_str("</div>\n");
        }
        Outcome::Clogging(prediction) => {
            out.push_str(r#"<div class="metrics">"#);
            metric(&mut out, prediction);
            out.push_str("</div>\n");
        }
        Outcome::Error(message) => {
            let _ = writeln!(out, r#"<div class="error">{}</div>"#, escape(message));
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}
