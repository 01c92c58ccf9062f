//! 語彙ID → 重みの疎ベクトル。
use std::collections::BTreeMap;

/// 語彙ID。
pub type TermId = u32;

/// 語彙ID昇順に並んだ疎ベクトル。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(TermId, f64)>,
}

impl SparseVector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 順不同の (id, 値) 列から構築する。同じIDは加算される。
    pub fn from_unsorted<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (TermId, f64)>,
    {
        let mut merged: BTreeMap<TermId, f64> = BTreeMap::new();
        for (id, value) in pairs {
            *merged.entry(id).or_insert(0.0) += value;
        }
        Self {
            entries: merged.into_iter().collect(),
        }
    }

    /// ID昇順で重複のない列から構築する。
    #[must_use]
    pub(crate) fn from_sorted(entries: Vec<(TermId, f64)>) -> Self {
        debug_assert!(entries.windows(2).all(|pair| pair[0].0 < pair[1].0));
        Self { entries }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TermId, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = (TermId, &mut f64)> {
        self.entries.iter_mut().map(|(id, value)| (*id, value))
    }

    #[must_use]
    pub fn get(&self, id: TermId) -> Option<f64> {
        self.entries
            .binary_search_by_key(&id, |(term, _)| *term)
            .ok()
            .map(|idx| self.entries[idx].1)
    }

    /// 最大ID + 1（空なら0）。
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.entries
            .last()
            .map_or(0, |(id, _)| *id as usize + 1)
    }

    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        let (mut left, mut right) = (self.entries.iter(), other.entries.iter());
        let (mut a, mut b) = (left.next(), right.next());
        let mut sum = 0.0;
        while let (Some(&(ia, va)), Some(&(ib, vb))) = (a, b) {
            match ia.cmp(&ib) {
                std::cmp::Ordering::Less => a = left.next(),
                std::cmp::Ordering::Greater => b = right.next(),
                std::cmp::Ordering::Equal => {
                    sum += va * vb;
                    a = left.next();
                    b = right.next();
                }
            }
        }
        sum
    }

    #[must_use]
    pub fn squared_norm(&self) -> f64 {
        self.entries.iter().map(|(_, value)| value * value).sum()
    }

    #[must_use]
    pub fn norm(&self) -> f64 {
        self.squared_norm().sqrt()
    }

    /// `|a - b|^2`。
    #[must_use]
    pub fn squared_distance(&self, other: &Self) -> f64 {
        (self.squared_norm() + other.squared_norm() - 2.0 * self.dot(other)).max(0.0)
    }

    /// 単位長に正規化したコピー。ノルム0ならそのまま返す。
    #[must_use]
    pub fn unit(&self) -> Self {
        let norm = self.norm();
        if norm == 0.0 {
            return self.clone();
        }
        Self {
            entries: self
                .entries
                .iter()
                .map(|&(id, value)| (id, value / norm))
                .collect(),
        }
    }

    /// 密ベクトルとの内積。範囲外のIDは無視する。
    #[must_use]
    pub fn dot_dense(&self, dense: &[f64]) -> f64 {
        self.entries
            .iter()
            .filter_map(|&(id, value)| dense.get(id as usize).map(|weight| weight * value))
            .sum()
    }
}

impl FromIterator<(TermId, f64)> for SparseVector {
    fn from_iter<T: IntoIterator<Item = (TermId, f64)>>(iter: T) -> Self {
        Self::from_unsorted(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsorted_pairs_are_merged() {
        let vector = SparseVector::from_unsorted([(3, 1.0), (1, 2.0), (3, 0.5)]);
        assert_eq!(vector.iter().collect::<Vec<_>>(), vec![(1, 2.0), (3, 1.5)]);
        assert_eq!(vector.get(3), Some(1.5));
        assert_eq!(vector.get(2), None);
        assert_eq!(vector.dimension(), 4);
    }

    #[test]
    fn dot_and_distance() {
        let a = SparseVector::from_unsorted([(0, 1.0), (2, 2.0)]);
        let b = SparseVector::from_unsorted([(2, 3.0), (5, 1.0)]);
        assert!((a.dot(&b) - 6.0).abs() < 1e-12);
        // |a-b|^2 = 1 + 1 + 1
        assert!((a.squared_distance(&b) - 3.0).abs() < 1e-12);
        assert!((a.unit().norm() - 1.0).abs() < 1e-12);
        assert!(SparseVector::new().unit().is_empty());
    }
}
