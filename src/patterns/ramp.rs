//! Gradual buildup with minor relief.

use super::{random_alloc, random_free};
use crate::{Chooser, Trace};

/// Number of discrete steps in the ramp.
pub(super) const STEPS: usize = 20;

/// Frees attempted at the end of every step.
pub(super) const FREES_PER_STEP: usize = 2;

/// Each step attempts `max_active_slots / STEPS` allocations and then
/// `FREES_PER_STEP` frees, so live slots accumulate slowly.
pub(super) fn ramp<C>(trace: &mut Trace, chooser: &mut C, max_active_slots: usize)
where
    C: Chooser + ?Sized,
{
    let allocs_per_step = max_active_slots / STEPS;
    for step in 0..STEPS {
        for _ in 0..allocs_per_step {
            if !random_alloc(trace, chooser) {
                break;
            }
        }
        for _ in 0..FREES_PER_STEP {
            random_free(trace, chooser);
        }
        log::trace!(
            "ramp step {step}: {} live slots, {} bytes",
            trace.slots().live_count(),
            trace.slots().live_bytes()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AllocatorKind, Config, Event, ScriptedChooser};

    #[test]
    fn small_tables_get_no_structured_allocations() {
        // 8 / 20 == 0 allocations per step, and nothing to free.
        let config = Config::standard(AllocatorKind::Buddy);
        let mut trace = Trace::new(config);
        let mut chooser = ScriptedChooser::new([]);
        ramp(&mut trace, &mut chooser, config.max_active_slots());
        assert!(trace.is_empty());
    }

    #[test]
    fn steps_allocate_then_free() {
        let config = Config::standard(AllocatorKind::Slab);
        let mut trace = Trace::new(config);
        // Exhausted script: always the lowest free slot, size 16, and the
        // lowest live slot.
        let mut chooser = ScriptedChooser::new([]);
        ramp(&mut trace, &mut chooser, config.max_active_slots());

        // 500 / 20 == 25 allocations and 2 frees per step.
        assert_eq!(trace.events().len(), STEPS * (25 + FREES_PER_STEP));
        assert_eq!(trace.slots().live_count(), STEPS * (25 - FREES_PER_STEP));
        assert_eq!(
            &trace.events()[..3],
            &[
                Event::Alloc { index: 0, size: 16 },
                Event::Alloc { index: 1, size: 16 },
                Event::Alloc { index: 2, size: 16 },
            ]
        );
        assert_eq!(
            &trace.events()[25..27],
            &[Event::Free { index: 0 }, Event::Free { index: 1 }]
        );
        // The second step reuses the freed slots first.
        assert_eq!(trace.events()[27], Event::Alloc { index: 0, size: 16 });
    }
}
