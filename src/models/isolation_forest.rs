//! Isolation forest outlier detector
//!
//! Random axis-aligned splits isolate unusual rows in fewer steps than rows
//! inside a dense cluster. The forest is grown from a seeded RNG, so the same
//! batch always yields the same labels.

use crate::error::{Result, ScoringError};
use crate::models::{label_by_contamination, OutlierDetector};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful binary-search-tree lookup over
/// `n` points; normalizes tree depths.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One randomly grown isolation tree (arena of nodes, root at index 0)
#[derive(Debug)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(x: &Array2<f64>, sample: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(x, sample, 0, max_depth, rng);
        tree
    }

    fn build(
        &mut self,
        x: &Array2<f64>,
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: indices.len(),
        });
        if depth >= max_depth || indices.len() <= 1 {
            return id;
        }

        // Only features that still vary inside this node can split it
        let spans: Vec<(usize, f64, f64)> = (0..x.ncols())
            .filter_map(|feature| {
                let (min, max) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| (lo.min(x[[i, feature]]), hi.max(x[[i, feature]])),
                );
                (max > min).then_some((feature, min, max))
            })
            .collect();
        if spans.is_empty() {
            return id;
        }

        let (feature, min, max) = spans[rng.gen_range(0..spans.len())];
        let threshold = rng.gen_range(min..max);
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, feature]] <= threshold);

        let left = self.build(x, left, depth + 1, max_depth, rng);
        let right = self.build(x, right, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    /// Edges from the root to the row's leaf, plus the expected remaining
    /// depth of the leaf's unsplit points.
    fn path_length(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[feature] <= threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Isolation-based detector with a fixed contamination prior.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    contamination: f64,
    random_state: u64,
}

impl IsolationForest {
    pub fn new() -> Self {
        Self {
            n_estimators: crate::config::IF_ESTIMATORS,
            max_samples: crate::config::IF_MAX_SAMPLES,
            contamination: crate::config::CONTAMINATION,
            random_state: crate::config::RANDOM_STATE,
        }
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Negated anomaly scores in `[-1, 0]`; lower means more anomalous.
    pub fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_estimators == 0 || self.max_samples == 0 {
            return Err(ScoringError::Detector {
                detector: self.name(),
                reason: "n_estimators and max_samples must be positive".to_string(),
            });
        }

        let n = x.nrows();
        if n == 0 {
            return Ok(Array1::zeros(0));
        }

        let subsample = self.max_samples.min(n);
        let max_depth = (subsample as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.random_state);

        let trees: Vec<IsolationTree> = (0..self.n_estimators)
            .map(|_| {
                let sample = rand::seq::index::sample(&mut rng, n, subsample).into_vec();
                IsolationTree::grow(x, sample, max_depth, &mut rng)
            })
            .collect();

        let norm = average_path_length(subsample);
        debug!(
            trees = trees.len(),
            subsample = subsample,
            max_depth = max_depth,
            "Isolation forest grown"
        );

        Ok(Array1::from_iter((0..n).map(|i| {
            let mean_depth = trees.iter().map(|t| t.path_length(x.row(i))).sum::<f64>()
                / trees.len() as f64;
            if norm > 0.0 {
                -(2f64.powf(-mean_depth / norm))
            } else {
                -0.5
            }
        })))
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl OutlierDetector for IsolationForest {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn column(&self) -> &'static str {
        "IF_outlier"
    }

    fn fit_predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let scores = self.score_samples(x)?;
        Ok(label_by_contamination(&scores, self.contamination))
    }
}
