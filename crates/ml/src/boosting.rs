//! Gradient-boosted regression trees with the squared-error objective.
//!
//! Trees are grown depth-first with exact greedy split search over the sorted
//! feature values. Leaf weights and split gains use the second-order
//! formulation with L2 regularisation on the leaf weights.

use linfa::traits::{Fit, PredictInplace};
use linfa::DatasetBase;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Data, Ix2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MlError, Result};

/// Splits whose loss reduction does not exceed this are not taken.
const MIN_SPLIT_GAIN: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// L2 penalty on leaf weights.
    pub reg_lambda: f64,
    /// Minimum loss reduction required to split a node.
    pub gamma: f64,
    /// Minimum sum of hessians in each child.
    pub min_child_weight: f64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            learning_rate: 0.05,
            max_depth: 6,
            reg_lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
        }
    }
}

impl GradientBoostingParams {
    pub fn n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn check(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(MlError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.reg_lambda < 0.0 || self.gamma < 0.0 || self.min_child_weight < 0.0 {
            return Err(MlError::InvalidParameter(
                "reg_lambda, gamma and min_child_weight must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
enum Node {
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    Leaf { value: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Split { feature, threshold, left, right } => {
                    index = if row[feature] < threshold { left } else { right };
                }
                Node::Leaf { value } => return value,
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|node| matches!(node, Node::Leaf { .. })).count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match nodes[index] {
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
                Node::Leaf { .. } => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    x: ArrayView2<'a, f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a GradientBoostingParams,
    nodes: Vec<Node>,
    gain_by_feature: &'a mut [f64],
}

impl TreeBuilder<'_> {
    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.reg_lambda) * self.params.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.reg_lambda)
    }

    fn build(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let g: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = indices.iter().map(|&i| self.hess[i]).sum();

        let split = if depth < self.params.max_depth {
            self.best_split(indices, g, h)
        } else {
            None
        };

        let Some(split) = split else {
            self.nodes.push(Node::Leaf { value: self.leaf_weight(g, h) });
            return self.nodes.len() - 1;
        };

        self.gain_by_feature[split.feature] += split.gain;

        let position = partition(indices, |i| self.x[[i, split.feature]] < split.threshold);
        let (left_rows, right_rows) = indices.split_at_mut(position);

        let node = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.nodes[node] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node
    }

    fn best_split(&self, indices: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        if indices.len() < 2 {
            return None;
        }

        let parent = self.score(g, h);
        let mut best: Option<SplitCandidate> = None;
        let mut order = indices.to_vec();

        for feature in 0..self.x.ncols() {
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for k in 0..order.len() - 1 {
                let row = order[k];
                g_left += self.grad[row];
                h_left += self.hess[row];

                let value = self.x[[row, feature]];
                let next = self.x[[order[k + 1], feature]];
                if value >= next {
                    continue;
                }

                let (g_right, h_right) = (g - g_left, h - h_left);
                if h_left < self.params.min_child_weight || h_right < self.params.min_child_weight {
                    continue;
                }

                let gain = 0.5 * (self.score(g_left, h_left) + self.score(g_right, h_right) - parent)
                    - self.params.gamma;
                if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: value + (next - value) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// Reorders `items` so that every element satisfying `pred` comes first and
/// returns the number of such elements.
fn partition(items: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut boundary = 0;
    for i in 0..items.len() {
        if pred(items[i]) {
            items.swap(boundary, i);
            boundary += 1;
        }
    }
    boundary
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FittedGradientBoosting {
    base_score: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
    gain_by_feature: Vec<f64>,
}

impl Fit<Array2<f64>, Array1<f64>, MlError> for GradientBoostingParams {
    type Object = FittedGradientBoosting;

    fn fit(&self, dataset: &DatasetBase<Array2<f64>, Array1<f64>>) -> Result<FittedGradientBoosting> {
        self.check()?;

        let x = dataset.records();
        let y = dataset.targets();
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 {
            return Err(MlError::Shape("gradient boosting needs at least one sample".to_string()));
        }
        if y.len() != n_samples {
            return Err(MlError::Shape(format!("{} targets for {n_samples} samples", y.len())));
        }

        let base_score = y.mean().unwrap_or(0.0);
        let mut predictions = vec![base_score; n_samples];
        let hess = vec![1.0; n_samples];
        let mut grad = vec![0.0; n_samples];
        let mut gain_by_feature = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(self.n_estimators);

        for round in 0..self.n_estimators {
            for i in 0..n_samples {
                grad[i] = predictions[i] - y[i];
            }

            let mut builder = TreeBuilder {
                x: x.view(),
                grad: &grad,
                hess: &hess,
                params: self,
                nodes: Vec::new(),
                gain_by_feature: &mut gain_by_feature,
            };
            let mut indices: Vec<usize> = (0..n_samples).collect();
            builder.build(&mut indices, 0);
            let tree = RegressionTree { nodes: builder.nodes };

            for (i, prediction) in predictions.iter_mut().enumerate() {
                *prediction += tree.predict_row(x.row(i));
            }
            trees.push(tree);

            if round % 100 == 99 {
                let mse = predictions
                    .iter()
                    .zip(y.iter())
                    .map(|(p, t)| (p - t) * (p - t))
                    .sum::<f64>()
                    / n_samples as f64;
                debug!("Boosting round {}: training mse {:.6}", round + 1, mse);
            }
        }

        Ok(FittedGradientBoosting { base_score, trees, n_features, gain_by_feature })
    }
}

impl FittedGradientBoosting {
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.base_score + self.trees.iter().map(|tree| tree.predict_row(row)).sum::<f64>()
    }

    /// Total split gain per feature, normalised to sum to one. All zeros when
    /// no tree split at all.
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.gain_by_feature.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.n_features];
        }
        self.gain_by_feature.iter().map(|gain| gain / total).collect()
    }
}

impl<D: Data<Elem = f64>> PredictInplace<ArrayBase<D, Ix2>, Array1<f64>> for FittedGradientBoosting {
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<f64>) {
        assert_eq!(x.ncols(), self.n_features, "feature count mismatch");
        assert_eq!(x.nrows(), y.len(), "target buffer has wrong length");
        for (row, target) in x.rows().into_iter().zip(y.iter_mut()) {
            *target = self.predict_row(row);
        }
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<f64> {
        Array1::zeros(x.nrows())
    }
}
