//! C-SVC を SMO（2次の作業集合選択）で解くカーネルSVM。
use std::fmt;
use std::mem;
use std::rc::Rc;

use ndarray::Array1;
use rustc_hash::FxHashMap;

use super::{ClassifierError, Label};
use crate::classification::SparseVector;

const TAU: f64 = 1e-12;
const TOLERANCE: f64 = 1e-3;
const POLYNOMIAL_DEGREE: i32 = 3;
const COEF0: f64 = 0.0;
/// 学習1回あたりに保持する Q 行列の行の上限（バイト）。
const Q_CACHE_BYTES: usize = 100 * 1024 * 1024;

/// カーネルの種類（整数コード 0..=3）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelType {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
}

impl KernelType {
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Linear => 0,
            Self::Polynomial => 1,
            Self::Rbf => 2,
            Self::Sigmoid => 3,
        }
    }
}

impl TryFrom<i64> for KernelType {
    type Error = ClassifierError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Linear),
            1 => Ok(Self::Polynomial),
            2 => Ok(Self::Rbf),
            3 => Ok(Self::Sigmoid),
            other => Err(ClassifierError::UnsupportedKernel(other)),
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// カーネル関数とそのパラメータ。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub kernel: KernelType,
    pub gamma: f64,
    pub coef0: f64,
    pub degree: i32,
}

impl KernelParams {
    /// γ = 1 / 特徴数（最大ID + 1）。特徴がなければ0。
    #[must_use]
    pub fn for_dimension(kernel: KernelType, dimension: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let gamma = if dimension == 0 {
            0.0
        } else {
            1.0 / dimension as f64
        };
        Self {
            kernel,
            gamma,
            coef0: COEF0,
            degree: POLYNOMIAL_DEGREE,
        }
    }

    #[must_use]
    pub fn evaluate(&self, left: &SparseVector, right: &SparseVector) -> f64 {
        match self.kernel {
            KernelType::Linear => left.dot(right),
            KernelType::Polynomial => (self.gamma * left.dot(right) + self.coef0).powi(self.degree),
            KernelType::Rbf => (-self.gamma * left.squared_distance(right)).exp(),
            KernelType::Sigmoid => (self.gamma * left.dot(right) + self.coef0).tanh(),
        }
    }
}

/// サポートベクトルと係数 `y_i α_i`、しきい値 ρ。
#[derive(Debug, Clone)]
pub struct KernelModel {
    params: KernelParams,
    support_vectors: Vec<SparseVector>,
    coefficients: Vec<f64>,
    rho: f64,
}

impl KernelModel {
    #[must_use]
    pub fn train(
        vectors: &[SparseVector],
        labels: &[Label],
        kernel: KernelType,
        cost: f64,
    ) -> Self {
        Self::train_with_cache(vectors, labels, kernel, cost, cache_rows(vectors.len()))
    }

    fn train_with_cache(
        vectors: &[SparseVector],
        labels: &[Label],
        kernel: KernelType,
        cost: f64,
        cache_rows: usize,
    ) -> Self {
        let dimension = vectors
            .iter()
            .map(SparseVector::dimension)
            .max()
            .unwrap_or(0);
        let params = KernelParams::for_dimension(kernel, dimension);
        let targets: Vec<f64> = labels.iter().map(|label| label.sign()).collect();

        let mut solver = Solver::new(vectors, &targets, params, cost, cache_rows);
        let iterations = solver.solve();
        let rho = solver.rho();

        let mut support_vectors = Vec::new();
        let mut coefficients = Vec::new();
        for (idx, &alpha) in solver.alpha.iter().enumerate() {
            if alpha > 0.0 {
                support_vectors.push(vectors[idx].clone());
                coefficients.push(targets[idx] * alpha);
            }
        }
        tracing::trace!(
            iterations,
            support_vectors = support_vectors.len(),
            rho,
            "kernel svm trained"
        );

        Self {
            params,
            support_vectors,
            coefficients,
            rho,
        }
    }

    #[must_use]
    pub fn num_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    #[must_use]
    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// `Σ y_i α_i K(x_i, x) - ρ`
    #[must_use]
    pub fn decision_value(&self, vector: &SparseVector) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.coefficients)
            .map(|(support, coefficient)| coefficient * self.params.evaluate(support, vector))
            .sum::<f64>()
            - self.rho
    }

    #[must_use]
    pub fn predict(&self, vector: &SparseVector) -> Label {
        Label::from_decision(self.decision_value(vector))
    }
}

/// 予算内に収まる Q の行数。
fn cache_rows(size: usize) -> usize {
    let row_bytes = size.max(1) * mem::size_of::<f64>();
    (Q_CACHE_BYTES / row_bytes).clamp(2, size.max(2))
}

/// `Q_ij = y_i y_j K(x_i, x_j)` の行を必要になった時点で計算し、
/// 最も長く使われていない行から捨てる。
struct QRows<'a> {
    vectors: &'a [SparseVector],
    targets: &'a [f64],
    params: KernelParams,
    rows: FxHashMap<usize, (u64, Rc<Array1<f64>>)>,
    capacity: usize,
    clock: u64,
}

impl<'a> QRows<'a> {
    fn new(
        vectors: &'a [SparseVector],
        targets: &'a [f64],
        params: KernelParams,
        capacity: usize,
    ) -> Self {
        Self {
            vectors,
            targets,
            params,
            rows: FxHashMap::default(),
            capacity: capacity.max(2),
            clock: 0,
        }
    }

    /// `y_i^2 = 1` なので対角は `K(x_i, x_i)`。
    fn diagonal(&self) -> Vec<f64> {
        self.vectors
            .iter()
            .map(|vector| self.params.evaluate(vector, vector))
            .collect()
    }

    fn row(&mut self, i: usize) -> Rc<Array1<f64>> {
        self.clock += 1;
        let clock = self.clock;
        if let Some((used, row)) = self.rows.get_mut(&i) {
            *used = clock;
            return Rc::clone(row);
        }

        if self.rows.len() >= self.capacity {
            let oldest = self
                .rows
                .iter()
                .min_by_key(|(_, (used, _))| *used)
                .map(|(idx, _)| *idx);
            if let Some(oldest) = oldest {
                self.rows.remove(&oldest);
            }
        }

        let yi = self.targets[i];
        let left = &self.vectors[i];
        let row: Array1<f64> = self
            .vectors
            .iter()
            .zip(self.targets)
            .map(|(right, yj)| yi * yj * self.params.evaluate(left, right))
            .collect();
        let row = Rc::new(row);
        self.rows.insert(i, (clock, Rc::clone(&row)));
        row
    }

    fn cached(&self) -> usize {
        self.rows.len()
    }
}

/// 双対問題 `min 0.5 αᵀQα - eᵀα, 0 <= α_i <= C, yᵀα = 0` の SMO ソルバ。
struct Solver<'a> {
    targets: &'a [f64],
    q: QRows<'a>,
    diagonal: Vec<f64>,
    alpha: Vec<f64>,
    gradient: Array1<f64>,
    cost: f64,
}

impl<'a> Solver<'a> {
    fn new(
        vectors: &'a [SparseVector],
        targets: &'a [f64],
        params: KernelParams,
        cost: f64,
        cache_rows: usize,
    ) -> Self {
        let size = vectors.len();
        let q = QRows::new(vectors, targets, params, cache_rows);
        let diagonal = q.diagonal();
        Self {
            targets,
            q,
            diagonal,
            alpha: vec![0.0; size],
            gradient: Array1::from_elem(size, -1.0),
            cost,
        }
    }

    fn is_upper_bound(&self, idx: usize) -> bool {
        self.alpha[idx] >= self.cost
    }

    fn is_lower_bound(&self, idx: usize) -> bool {
        self.alpha[idx] <= 0.0
    }

    /// 反復回数を返す。
    fn solve(&mut self) -> usize {
        let size = self.alpha.len();
        let max_iterations = (100 * size).max(10_000_000);
        let mut iterations = 0;
        while iterations < max_iterations {
            let Some((i, j)) = self.select_working_set() else {
                break;
            };
            self.update_pair(i, j);
            iterations += 1;
        }
        if iterations == max_iterations {
            tracing::warn!(iterations, "smo reached the iteration limit");
        }
        tracing::trace!(cached_rows = self.q.cached(), "q rows in cache");
        iterations
    }

    /// 最大違反ペア i と、目的関数の減少量が最大となる j を選ぶ。
    fn select_working_set(&mut self) -> Option<(usize, usize)> {
        let mut gmax = f64::NEG_INFINITY;
        let mut gmax2 = f64::NEG_INFINITY;
        let mut gmax_idx = None;

        for t in 0..self.alpha.len() {
            if self.targets[t] > 0.0 {
                if !self.is_upper_bound(t) && -self.gradient[t] >= gmax {
                    gmax = -self.gradient[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.gradient[t] >= gmax {
                gmax = self.gradient[t];
                gmax_idx = Some(t);
            }
        }

        let i = gmax_idx?;
        let yi = self.targets[i];
        let q_i = self.q.row(i);
        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;

        for j in 0..self.alpha.len() {
            let (grad_diff, quad_coef) = if self.targets[j] > 0.0 {
                if self.is_lower_bound(j) {
                    continue;
                }
                gmax2 = gmax2.max(self.gradient[j]);
                (
                    gmax + self.gradient[j],
                    self.diagonal[i] + self.diagonal[j] - 2.0 * yi * q_i[j],
                )
            } else {
                if self.is_upper_bound(j) {
                    continue;
                }
                gmax2 = gmax2.max(-self.gradient[j]);
                (
                    gmax - self.gradient[j],
                    self.diagonal[i] + self.diagonal[j] + 2.0 * yi * q_i[j],
                )
            };
            if grad_diff > 0.0 {
                let curvature = if quad_coef > 0.0 { quad_coef } else { TAU };
                let obj_diff = -(grad_diff * grad_diff) / curvature;
                if obj_diff <= obj_diff_min {
                    gmin_idx = Some(j);
                    obj_diff_min = obj_diff;
                }
            }
        }

        if gmax + gmax2 < TOLERANCE {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    fn update_pair(&mut self, i: usize, j: usize) {
        let cost = self.cost;
        let old_i = self.alpha[i];
        let old_j = self.alpha[j];
        let row_i = self.q.row(i);
        let row_j = self.q.row(j);
        let q_ij = row_i[j];

        if self.targets[i] != self.targets[j] {
            let mut quad_coef = self.diagonal[i] + self.diagonal[j] + 2.0 * q_ij;
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (-self.gradient[i] - self.gradient[j]) / quad_coef;
            let diff = old_i - old_j;
            let (mut ai, mut aj) = (old_i + delta, old_j + delta);
            if diff > 0.0 {
                if aj < 0.0 {
                    aj = 0.0;
                    ai = diff;
                }
            } else if ai < 0.0 {
                ai = 0.0;
                aj = -diff;
            }
            if diff > 0.0 {
                if ai > cost {
                    ai = cost;
                    aj = cost - diff;
                }
            } else if aj > cost {
                aj = cost;
                ai = cost + diff;
            }
            self.alpha[i] = ai;
            self.alpha[j] = aj;
        } else {
            let mut quad_coef = self.diagonal[i] + self.diagonal[j] - 2.0 * q_ij;
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (self.gradient[i] - self.gradient[j]) / quad_coef;
            let sum = old_i + old_j;
            let (mut ai, mut aj) = (old_i - delta, old_j + delta);
            if sum > cost {
                if ai > cost {
                    ai = cost;
                    aj = sum - cost;
                }
            } else if aj < 0.0 {
                aj = 0.0;
                ai = sum;
            }
            if sum > cost {
                if aj > cost {
                    aj = cost;
                    ai = sum - cost;
                }
            } else if ai < 0.0 {
                ai = 0.0;
                aj = sum;
            }
            self.alpha[i] = ai;
            self.alpha[j] = aj;
        }

        let delta_i = self.alpha[i] - old_i;
        let delta_j = self.alpha[j] - old_j;
        self.gradient.scaled_add(delta_i, &*row_i);
        self.gradient.scaled_add(delta_j, &*row_j);
    }

    /// 自由なサポートベクトルがあればその平均、なければ上下限の中点。
    fn rho(&self) -> f64 {
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        let mut free_count = 0usize;
        let mut free_sum = 0.0;

        for idx in 0..self.alpha.len() {
            let y_gradient = self.targets[idx] * self.gradient[idx];
            let positive = self.targets[idx] > 0.0;
            if self.is_upper_bound(idx) {
                if positive {
                    lower = lower.max(y_gradient);
                } else {
                    upper = upper.min(y_gradient);
                }
            } else if self.is_lower_bound(idx) {
                if positive {
                    upper = upper.min(y_gradient);
                } else {
                    lower = lower.max(y_gradient);
                }
            } else {
                free_count += 1;
                free_sum += y_gradient;
            }
        }

        if free_count > 0 {
            #[allow(clippy::cast_precision_loss)]
            let count = free_count as f64;
            free_sum / count
        } else {
            (upper + lower) / 2.0
        }
    }
}
