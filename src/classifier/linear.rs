//! L2正則化・L2損失の線形SVM（主問題を Newton-CG で解く）。
use super::Label;
use crate::classification::SparseVector;

const MAX_NEWTON_ITERATIONS: usize = 1000;
const MAX_CG_ITERATIONS: usize = 250;
const MAX_LINE_SEARCH_STEPS: usize = 20;
/// 勾配ノルムが初期値のこの割合以下になったら終了する。
const STOPPING_TOLERANCE: f64 = 0.01;
const CG_TOLERANCE: f64 = 0.1;
const ARMIJO: f64 = 0.01;

/// 学習済みの重みベクトル。バイアス項は持たない。
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    weights: Vec<f64>,
}

impl LinearModel {
    /// `min_w 0.5 |w|^2 + C Σ max(0, 1 - y_i w·x_i)^2` を解く。
    #[must_use]
    pub fn train(vectors: &[SparseVector], labels: &[Label], cost: f64) -> Self {
        let dimension = vectors
            .iter()
            .map(SparseVector::dimension)
            .max()
            .unwrap_or(0);
        let targets: Vec<f64> = labels.iter().map(|label| label.sign()).collect();
        let problem = Problem {
            vectors,
            targets: &targets,
            cost,
            dimension,
        };

        let mut weights = vec![0.0; dimension];
        let (mut objective, mut margins) = problem.evaluate(&weights);
        let mut gradient = problem.gradient(&weights, &margins);
        let initial_norm = norm(&gradient);
        if initial_norm == 0.0 {
            return Self { weights };
        }

        for iteration in 0..MAX_NEWTON_ITERATIONS {
            if norm(&gradient) <= STOPPING_TOLERANCE * initial_norm {
                break;
            }
            let active = problem.active_set(&margins);
            let direction = problem.newton_direction(&gradient, &active);
            let slope = dot(&gradient, &direction);

            let mut step = 1.0;
            let mut accepted = false;
            for _ in 0..MAX_LINE_SEARCH_STEPS {
                let candidate: Vec<f64> = weights
                    .iter()
                    .zip(&direction)
                    .map(|(w, d)| w + step * d)
                    .collect();
                let (candidate_objective, candidate_margins) = problem.evaluate(&candidate);
                if candidate_objective <= objective + ARMIJO * step * slope {
                    weights = candidate;
                    objective = candidate_objective;
                    margins = candidate_margins;
                    accepted = true;
                    break;
                }
                step *= 0.5;
            }
            if !accepted {
                tracing::debug!(iteration, objective, "line search made no progress");
                break;
            }
            gradient = problem.gradient(&weights, &margins);
        }

        Self { weights }
    }

    /// `w·x`。学習時にない語IDは寄与しない。
    #[must_use]
    pub fn decision_value(&self, vector: &SparseVector) -> f64 {
        vector.dot_dense(&self.weights)
    }

    #[must_use]
    pub fn predict(&self, vector: &SparseVector) -> Label {
        Label::from_decision(self.decision_value(vector))
    }
}

struct Problem<'a> {
    vectors: &'a [SparseVector],
    targets: &'a [f64],
    cost: f64,
    dimension: usize,
}

impl Problem<'_> {
    /// 目的関数値と各サンプルの `w·x_i` を返す。
    fn evaluate(&self, weights: &[f64]) -> (f64, Vec<f64>) {
        let margins: Vec<f64> = self
            .vectors
            .iter()
            .map(|vector| vector.dot_dense(weights))
            .collect();
        let loss: f64 = margins
            .iter()
            .zip(self.targets)
            .map(|(z, y)| {
                let slack = 1.0 - y * z;
                if slack > 0.0 { slack * slack } else { 0.0 }
            })
            .sum();
        (0.5 * dot(weights, weights) + self.cost * loss, margins)
    }

    /// 損失が正のサンプル。
    fn active_set(&self, margins: &[f64]) -> Vec<usize> {
        margins
            .iter()
            .zip(self.targets)
            .enumerate()
            .filter(|(_, (z, y))| *y * *z < 1.0)
            .map(|(idx, _)| idx)
            .collect()
    }

    fn gradient(&self, weights: &[f64], margins: &[f64]) -> Vec<f64> {
        let mut gradient = weights.to_vec();
        for idx in self.active_set(margins) {
            let coefficient = 2.0 * self.cost * (margins[idx] - self.targets[idx]);
            add_scaled(&mut gradient, &self.vectors[idx], coefficient);
        }
        gradient
    }

    /// 一般化ヘッセ行列とベクトルの積 `v + 2C Σ_{i∈I} (x_i·v) x_i`。
    fn hessian_product(&self, active: &[usize], direction: &[f64]) -> Vec<f64> {
        let mut product = direction.to_vec();
        for &idx in active {
            let vector = &self.vectors[idx];
            let coefficient = 2.0 * self.cost * vector.dot_dense(direction);
            add_scaled(&mut product, vector, coefficient);
        }
        product
    }

    /// 共役勾配法で `H d = -g` を近似的に解く。
    fn newton_direction(&self, gradient: &[f64], active: &[usize]) -> Vec<f64> {
        let mut direction = vec![0.0; self.dimension];
        let mut residual: Vec<f64> = gradient.iter().map(|g| -g).collect();
        let mut conjugate = residual.clone();
        let mut residual_sq = dot(&residual, &residual);
        let tolerance = CG_TOLERANCE * norm(gradient);

        for _ in 0..MAX_CG_ITERATIONS {
            if residual_sq.sqrt() <= tolerance {
                break;
            }
            let product = self.hessian_product(active, &conjugate);
            let curvature = dot(&conjugate, &product);
            if curvature <= 0.0 {
                break;
            }
            let alpha = residual_sq / curvature;
            for ((d, r), (p, hp)) in direction
                .iter_mut()
                .zip(residual.iter_mut())
                .zip(conjugate.iter().zip(&product))
            {
                *d += alpha * p;
                *r -= alpha * hp;
            }
            let next_sq = dot(&residual, &residual);
            let beta = next_sq / residual_sq;
            for (p, r) in conjugate.iter_mut().zip(&residual) {
                *p = r + beta * *p;
            }
            residual_sq = next_sq;
        }
        direction
    }
}

fn add_scaled(dense: &mut [f64], vector: &SparseVector, coefficient: f64) {
    for (id, value) in vector.iter() {
        dense[id as usize] += coefficient * value;
    }
}

fn dot(left: &[f64], right: &[f64]) -> f64 {
    left.iter().zip(right).map(|(a, b)| a * b).sum()
}

fn norm(vector: &[f64]) -> f64 {
    dot(vector, vector).sqrt()
}
