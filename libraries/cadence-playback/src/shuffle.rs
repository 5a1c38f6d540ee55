//! Shuffle helpers for playlist randomization

use rand::seq::SliceRandom;
use rand::Rng;

/// Rebuild `items` as `[items[keep]] + shuffled(rest)`
///
/// The kept entry moves to the front; the others keep nothing of their
/// original order (Fisher-Yates). Out-of-range `keep` leaves `items` as is.
pub fn shuffle_around<T, R: Rng>(items: &mut Vec<T>, keep: usize, rng: &mut R) {
    if keep >= items.len() {
        return;
    }

    let kept = items.remove(keep);
    items.shuffle(rng);
    items.insert(0, kept);
}

/// Pick a uniformly random index in `0..len` different from `current`
///
/// Rejects and resamples. Returns 0 when there is no other index to pick.
pub fn random_index_excluding<R: Rng>(len: usize, current: usize, rng: &mut R) -> usize {
    if len <= 1 {
        return 0;
    }

    loop {
        let candidate = rng.gen_range(0..len);
        if candidate != current {
            return candidate;
        }
    }
}
