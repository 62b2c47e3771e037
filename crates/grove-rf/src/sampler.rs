//! Bootstrap sampling with out-of-bag bookkeeping.

use rand::Rng;

/// One tree's bootstrap draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Bootstrap {
    /// Row indices drawn with replacement, in draw order.
    pub(crate) in_bag: Vec<usize>,
    /// Ascending row indices that were never drawn.
    pub(crate) out_of_bag: Vec<usize>,
}

/// Draw `draw_count` row indices uniformly with replacement from `0..n_samples`.
///
/// With `draw_count == n_samples` the expected out-of-bag share is
/// about e⁻¹ ≈ 0.368.
pub(crate) fn bootstrap_sample(
    n_samples: usize,
    draw_count: usize,
    rng: &mut impl Rng,
) -> Bootstrap {
    let mut drawn = vec![false; n_samples];
    let mut in_bag = Vec::with_capacity(draw_count);
    for _ in 0..draw_count {
        let idx = rng.gen_range(0..n_samples);
        in_bag.push(idx);
        drawn[idx] = true;
    }
    let out_of_bag = (0..n_samples).filter(|&i| !drawn[i]).collect();
    Bootstrap { in_bag, out_of_bag }
}
