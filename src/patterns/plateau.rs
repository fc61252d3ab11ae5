//! Sustained load with churn.

use super::{random_alloc, random_free, saturate};
use crate::{Chooser, Trace};

/// Free-then-allocate iterations after saturation.
pub(super) const CHURN_ITERATIONS: usize = 500;

pub(super) fn plateau<C>(trace: &mut Trace, chooser: &mut C, max_active_slots: usize)
where
    C: Chooser + ?Sized,
{
    saturate(trace, chooser, max_active_slots);
    // Freeing before allocating keeps utilization roughly level.
    for _ in 0..CHURN_ITERATIONS {
        random_free(trace, chooser);
        random_alloc(trace, chooser);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AllocatorKind, Config, Event, ScriptedChooser};

    #[test]
    fn churn_alternates_free_and_alloc() {
        let config = Config::standard(AllocatorKind::Buddy);
        let mut trace = Trace::new(config);
        // Exhausted script: lowest slot, size 16 every time.
        let mut chooser = ScriptedChooser::new([]);
        plateau(&mut trace, &mut chooser, config.max_active_slots());

        let events = trace.events();
        assert!(events[..8]
            .iter()
            .enumerate()
            .all(|(i, e)| *e == Event::Alloc { index: i, size: 16 }));
        assert_eq!(events[8], Event::Free { index: 0 });
        assert_eq!(events[9], Event::Alloc { index: 0, size: 16 });
        assert_eq!(trace.slots().live_count(), 8);
    }

    #[test]
    fn churn_is_capped_by_target() {
        let config = Config::standard(AllocatorKind::Buddy);
        let mut trace = Trace::new(config);
        let mut chooser = ScriptedChooser::new([]);
        plateau(&mut trace, &mut chooser, config.max_active_slots());
        // 8 saturating allocs plus 1000 churn events would overflow.
        assert_eq!(trace.len(), trace.target());
    }
}
