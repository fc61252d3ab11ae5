//! A sudden spike followed by a sharp drop.

use super::saturate;
use crate::{Chooser, Trace};

/// Saturate, then free every live slot except a random set of survivors.
pub(super) fn peak<C>(trace: &mut Trace, chooser: &mut C, max_active_slots: usize)
where
    C: Chooser + ?Sized,
{
    saturate(trace, chooser, max_active_slots);
    drop_to_survivors(trace, chooser, max_active_slots / 4);
}

/// Free every live slot except `min(live, survivors)` randomly chosen ones.
///
/// Slots are freed in ascending index order.
fn drop_to_survivors<C>(trace: &mut Trace, chooser: &mut C, survivors: usize)
where
    C: Chooser + ?Sized,
{
    let live = trace.slots().live_indices();
    let keep = chooser.sample(&live, survivors);
    log::debug!(
        "peak drop: freeing {} of {} live slots",
        live.len() - keep.len(),
        live.len()
    );
    for index in live {
        if !keep.contains(&index) {
            let _ = trace.free(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AllocatorKind, Config, Event, RandomChooser, ScriptedChooser};

    fn frees_after(trace: &Trace, start: usize) -> Vec<usize> {
        trace.events()[start..]
            .iter()
            .map(|event| match *event {
                Event::Free { index } => index,
                Event::Alloc { .. } => panic!("unexpected allocation in drop phase"),
            })
            .collect()
    }

    #[test]
    fn drop_keeps_survivors() {
        let mut trace = Trace::new(Config::standard(AllocatorKind::Buddy));
        for index in 0..8 {
            trace.alloc(index, 100).unwrap();
        }
        // Survivors are chosen by partial Fisher-Yates: slot 5, then slot 1.
        let mut chooser = ScriptedChooser::new([5, 0]);
        drop_to_survivors(&mut trace, &mut chooser, 2);
        assert_eq!(frees_after(&trace, 8), vec![0, 2, 3, 4, 6, 7]);
        assert_eq!(trace.slots().live_indices(), vec![1, 5]);
    }

    #[test]
    fn free_burst_matches_survivor_rule() {
        let mut chooser = RandomChooser::new(42);
        for kind in AllocatorKind::ALL {
            let config = Config::standard(kind);
            let max_active = config.max_active_slots();
            let mut trace = Trace::new(config);

            saturate(&mut trace, &mut chooser, max_active);
            let saturated = trace.events().len();
            let live = trace.slots().live_count();
            assert!(trace.events().iter().all(|e| matches!(e, Event::Alloc { .. })));

            drop_to_survivors(&mut trace, &mut chooser, max_active / 4);
            let burst = frees_after(&trace, saturated);
            assert_eq!(burst.len(), live - live.min(max_active / 4), "{kind}");
            assert_eq!(trace.slots().live_count(), live.min(max_active / 4));
        }
    }

    #[test]
    fn drop_with_nothing_live() {
        let mut trace = Trace::new(Config::standard(AllocatorKind::Bitmap));
        let mut chooser = ScriptedChooser::new([]);
        drop_to_survivors(&mut trace, &mut chooser, 2);
        assert!(trace.is_empty());
    }
}
