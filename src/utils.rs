use rand::Rng;

/// Removes a uniformly chosen element from `pool` and returns it.
///
/// Each draw shrinks the pool by one, so repeated draws sample without replacement.
pub fn draw<T, R: Rng + ?Sized>(rng: &mut R, pool: &mut Vec<T>) -> Option<T> {
    if pool.is_empty() {
        None
    } else {
        let idx = rng.gen_range(0..pool.len());
        Some(pool.swap_remove(idx))
    }
}

/// Running totals of `weights`, e.g. `[5, 90, 2]` becomes `[5, 95, 97]`.
pub fn cumulative(weights: &[u32]) -> Vec<u32> {
    weights
        .iter()
        .scan(0u32, |acc, &w| {
            *acc = acc.saturating_add(w);
            Some(*acc)
        })
        .collect()
}
