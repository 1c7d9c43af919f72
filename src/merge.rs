use crate::occurrence::Occurrence;
use tracing::debug;

/// Reconcile every detector's occurrence list for one container into a
/// single ordered, non-overlapping list.
///
/// Ordering: start ascending; occurrences sharing a start are ranked by
/// detector priority (table-cell > character-run > underline-space >
/// model-detected), then by end descending so the larger, more specific
/// range wins among equals. The greedy sweep then drops any occurrence
/// overlapping the most recently accepted one — first accepted wins, so a
/// higher-priority or earlier occurrence always survives an overlap.
/// Deterministic for identical detector outputs.
pub fn merge_occurrences(mut occurrences: Vec<Occurrence>) -> Vec<Occurrence> {
    occurrences.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(a.kind.priority().cmp(&b.kind.priority()))
            .then(b.end.cmp(&a.end))
    });

    let mut accepted: Vec<Occurrence> = Vec::new();
    for occ in occurrences {
        if let Some(prev) = accepted.last() {
            if occ.start < prev.end {
                debug!(
                    "dropping overlapping {} occurrence [{},{}) in {} (kept [{},{}))",
                    occ.kind.label(),
                    occ.start,
                    occ.end,
                    occ.container,
                    prev.start,
                    prev.end
                );
                continue;
            }
        }
        accepted.push(occ);
    }

    accepted
}
