//! The size-class sweep: a single long trace that walks the slot table
//! sequentially, cycling through power-of-two size classes, with free bursts
//! that grow as the trace fills and a final drain of everything still live.

use crate::{Capacity, Chooser, Config, Trace};

/// Lines held back from the burst phase for the final drain.
pub const DRAIN_RESERVE: usize = 100;

/// Most allocations attempted in a single burst.
const MAX_BURST: usize = 5;

/// Free bursts only happen once more than this many slots are live.
const FREE_THRESHOLD: usize = 10;

/// Free burst sizes scale from `MIN_FREES` up to `MAX_FREES`.
const MIN_FREES: usize = 3;
const MAX_FREES: usize = 30;

/// No allocation is ever smaller than this, jitter included.
const MIN_SWEEP_SIZE: usize = 8;

/// The base allocation sizes for `config`.
///
/// Leveled configurations get `levels * 7 / 10` power-of-two multiples of the
/// smallest bucket, where the smallest bucket is the budget split across the
/// deepest level (at least 16 bytes). Slab configurations have a single class,
/// the unit size.
pub fn size_classes(config: &Config) -> Vec<usize> {
    match config.capacity() {
        Capacity::Slab { unit_size, .. } => vec![unit_size],
        Capacity::Leveled { levels } => {
            let min_bucket = (config.budget() >> levels.saturating_sub(1)).max(16);
            let count = (levels as usize * 7 / 10).max(1);
            (0..count)
                .map_while(|i| min_bucket.checked_mul(1 << i))
                .collect()
        }
    }
}

/// Generate the sweep trace.
///
/// Until `target - DRAIN_RESERVE` lines are reached, each round attempts a
/// burst of one to five allocations at a sequential, wrapping cursor and then,
/// if more than ten slots are live, frees a random subset of them. The subset
/// grows from three up to thirty slots as the trace fills. Finally, every slot
/// still live is freed in ascending order until the trace is full.
pub fn sweep<C>(trace: &mut Trace, chooser: &mut C)
where
    C: Chooser + ?Sized,
{
    let classes = size_classes(trace.config());
    let slot_count = trace.slots().len();
    let burst_limit = trace.target().saturating_sub(DRAIN_RESERVE);
    let max_rounds = trace.target().saturating_mul(super::balance::ATTEMPTS_PER_LINE);

    let mut cursor = 0;
    let mut rounds = 0;
    while trace.len() < burst_limit {
        if rounds == max_rounds {
            log::warn!(
                "sweep gave up after {rounds} rounds at {} of {burst_limit} lines",
                trace.len()
            );
            break;
        }
        rounds += 1;

        let burst = chooser.size_in_range(1, MAX_BURST);
        for _ in 0..burst {
            if trace.len() >= burst_limit {
                break;
            }
            let base = classes[cursor % classes.len()];
            let jitter = base / 4;
            let size = chooser
                .size_in_range(base - jitter, base + jitter)
                .max(MIN_SWEEP_SIZE);
            let _ = trace.alloc(cursor, size);
            cursor = (cursor + 1) % slot_count;
        }

        let live = trace.slots().live_indices();
        if live.len() > FREE_THRESHOLD {
            let filled = trace.len().min(burst_limit);
            let max_frees =
                MIN_FREES + (MAX_FREES - MIN_FREES) * filled / burst_limit.max(1);
            let count = chooser.size_in_range(MIN_FREES, max_frees.min(live.len()));
            for index in chooser.sample(&live, count) {
                if trace.len() >= burst_limit {
                    break;
                }
                let _ = trace.free(index);
            }
        }
    }
    log::debug!(
        "sweep burst phase: {} lines, {} live slots",
        trace.len(),
        trace.slots().live_count()
    );

    for index in trace.slots().live_indices() {
        if trace.free(index).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AllocatorKind, Event, RandomChooser, SlotTable};

    #[test]
    fn default_size_classes() {
        // 16276 >> 9 == 31, seven classes.
        assert_eq!(
            size_classes(&Config::standard_sweep()),
            vec![31, 62, 124, 248, 496, 992, 1984]
        );
        assert_eq!(size_classes(&Config::standard(AllocatorKind::Slab)), vec![64]);
        // 2000 >> 3 == 250, 4 * 7 / 10 == 2 classes.
        assert_eq!(
            size_classes(&Config::standard(AllocatorKind::Buddy)),
            vec![250, 500]
        );
        // Tiny budgets still get the 16-byte floor and at least one class.
        assert_eq!(size_classes(&Config::buddy(100, 1).unwrap()), vec![100]);
        assert_eq!(size_classes(&Config::buddy(10, 0).unwrap()), vec![16]);
    }

    #[test]
    fn sweep_drains_everything() {
        let _ = env_logger::try_init();
        let mut chooser = RandomChooser::new(11);
        let mut trace = Trace::new(Config::standard_sweep());
        sweep(&mut trace, &mut chooser);

        assert!(trace.len() <= trace.target());
        assert!(trace.len() > trace.target() - DRAIN_RESERVE);
        assert_eq!(trace.slots().live_count(), 0);

        // Replay the events against a fresh table to double-check legality.
        let config = trace.config();
        let classes = size_classes(config);
        let largest = classes[classes.len() - 1];
        let mut replay = SlotTable::new(config.slot_count(), config.budget());
        for event in trace.events() {
            match *event {
                Event::Alloc { index, size } => {
                    assert!(size >= MIN_SWEEP_SIZE && size <= largest + largest / 4);
                    replay.try_allocate(index, size).unwrap();
                }
                Event::Free { index } => {
                    replay.try_free(index).unwrap();
                }
            }
        }
    }

    #[test]
    fn sweep_allocates_sequentially() {
        let mut chooser = crate::ScriptedChooser::new([]);
        let mut trace = Trace::new(Config::standard_sweep());
        sweep(&mut trace, &mut chooser);
        // Exhausted script: bursts of one allocation of the smallest jittered
        // size, so the cursor hands out slots 0, 1, 2, ...
        assert_eq!(trace.events()[0], Event::Alloc { index: 0, size: 24 });
        assert_eq!(trace.events()[1], Event::Alloc { index: 1, size: 47 });
        assert_eq!(trace.events()[2], Event::Alloc { index: 2, size: 93 });
    }
}
