use rand::Rng;
use rand::seq::index;

/// Draws `amount` elements of `pool` uniformly without replacement.
///
/// When `amount` covers the whole pool every element is returned in pool order
/// and the generator is left untouched, so the result is a pure function of
/// `(pool, amount, rng state)`.
pub fn sample_without_replacement<T, R>(pool: &[T], amount: usize, rng: &mut R) -> Vec<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    if amount >= pool.len() {
        return pool.to_vec();
    }
    index::sample(rng, pool.len(), amount)
        .into_iter()
        .map(|idx| pool[idx].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn same_seed_same_draw() {
        let pool: Vec<u32> = (0..50).collect();
        let first = sample_without_replacement(&pool, 7, &mut StdRng::seed_from_u64(9));
        let second = sample_without_replacement(&pool, 7, &mut StdRng::seed_from_u64(9));
        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
    }

    #[test]
    fn draw_has_no_duplicates() {
        let pool: Vec<u32> = (0..20).collect();
        let mut draw = sample_without_replacement(&pool, 10, &mut StdRng::seed_from_u64(1));
        draw.sort_unstable();
        draw.dedup();
        assert_eq!(draw.len(), 10);
    }

    #[test]
    fn oversized_request_returns_pool() {
        let pool = vec!["a", "b"];
        let draw = sample_without_replacement(&pool, 5, &mut StdRng::seed_from_u64(3));
        assert_eq!(draw, pool);
    }
}
