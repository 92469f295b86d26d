//! Victim selection.

use super::block::Line;
use crate::config::ReplacementPolicy;
use crate::random::SharedRng;
use itertools::Itertools;

/// Selects the position of the victim among `lines`.
///
/// Returns `None` when there are no candidates.
/// LRU ties resolve to the lowest position.
pub fn select_victim<'a>(
    policy: ReplacementPolicy,
    lines: impl ExactSizeIterator<Item = &'a Line>,
    rng: &SharedRng,
) -> Option<usize> {
    if lines.len() == 0 {
        return None;
    }
    match policy {
        ReplacementPolicy::Random => Some(rng.index(lines.len())),
        ReplacementPolicy::LRU => lines.position_min_by_key(|line| line.last_access_time),
    }
}
