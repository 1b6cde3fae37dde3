//! Warp formation
//!
//! A warp is a batch of up to `warp_width` ready threads of one CTA that
//! all enter the same hyperblock, executed together through one translated
//! entry point. Formation scans the ready queue once, groups threads by
//! next-entry hyperblock, and claims up to a warp's worth of the largest
//! group. Ties go to the group whose first thread queued earliest, so the
//! schedule is deterministic for a given queue state.

use warprun_ir::HyperblockId;

use crate::cta::CtaState;

/// A formed warp: the common entry hyperblock and the claimed slots
///
/// Slots are claimed (marked executing) at formation and stay in queue
/// order. The warp never owns the thread contexts; the executive checks
/// them out of the CTA for the duration of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warp {
    pub entry: HyperblockId,
    pub members: Vec<usize>,
}

impl Warp {
    pub fn width(&self) -> usize {
        self.members.len()
    }
}

/// Form the next warp from a CTA's ready queue
///
/// Returns `None` when no thread is ready. A warp may be narrower than
/// `warp_width` when the chosen group is small; translated code pads or
/// masks the missing lanes itself.
pub fn form_warp(cta: &mut CtaState, warp_width: usize) -> Option<Warp> {
    debug_assert!(warp_width > 0);

    // Group sizes in first-seen queue order.
    let mut groups: Vec<(HyperblockId, usize)> = Vec::new();
    for (_, entry) in cta.ready_entries() {
        match groups.iter_mut().find(|(id, _)| *id == entry) {
            Some((_, count)) => *count += 1,
            None => groups.push((entry, 1)),
        }
    }

    // Strictly-greater comparison keeps the earliest-queued group on ties.
    let (entry, _) = groups
        .into_iter()
        .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best })?;

    let members: Vec<usize> = cta
        .ready_entries()
        .filter(|&(_, slot_entry)| slot_entry == entry)
        .map(|(slot, _)| slot)
        .take(warp_width)
        .collect();

    cta.claim(&members);
    Some(Warp { entry, members })
}
