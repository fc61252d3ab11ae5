//! Workload patterns: the temporal shapes that allocation pressure follows
//! over the course of a trace.
//!
//! Each pattern runs a structured phase and then hands the trace to the
//! [`balance`] filler, which pads it to its target line count with uniformly
//! random allocations and frees.
//!
//! Every individual allocation or free attempt may be rejected, because there
//! is no eligible slot, the budget is exhausted, or the trace is full. A
//! rejected attempt is simply skipped; no pattern ever retries or fails.

use crate::{Chooser, ConfigError, Trace};
use core::fmt;
use core::str::FromStr;

mod balance;
mod peak;
mod plateau;
mod ramp;
pub mod sweep;

pub use balance::balance;

/// The smallest size a random allocation may have.
pub const MIN_ALLOC_SIZE: usize = 16;

/// A named temporal shape for a trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pattern {
    /// Gradual buildup with minor relief.
    Ramp,
    /// A sudden spike followed by a sharp drop.
    Peak,
    /// Sustained load with free-then-allocate churn.
    Plateau,
}

impl Pattern {
    /// Every pattern, in the order the driver emits them.
    pub const ALL: [Pattern; 3] = [Pattern::Ramp, Pattern::Peak, Pattern::Plateau];

    /// The name used in output file names.
    pub fn name(self) -> &'static str {
        match self {
            Pattern::Ramp => "ramp",
            Pattern::Peak => "peak",
            Pattern::Plateau => "plateau",
        }
    }

    /// Run this pattern's structured phase on `trace`, then balance it.
    ///
    /// `max_active_slots` bounds how many slots the structured phase tries to
    /// keep live at once; the driver uses
    /// [`Config::max_active_slots`][crate::Config::max_active_slots].
    pub fn run<C>(self, trace: &mut Trace, chooser: &mut C, max_active_slots: usize)
    where
        C: Chooser + ?Sized,
    {
        log::debug!(
            "running {self} pattern for {} (max active slots: {max_active_slots})",
            trace.config().kind()
        );
        match self {
            Pattern::Ramp => ramp::ramp(trace, chooser, max_active_slots),
            Pattern::Peak => peak::peak(trace, chooser, max_active_slots),
            Pattern::Plateau => plateau::plateau(trace, chooser, max_active_slots),
        }
        log::debug!("{self} structured phase produced {} lines", trace.len());
        balance(trace, chooser);
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::ALL
            .into_iter()
            .find(|pattern| pattern.name() == s)
            .ok_or_else(|| ConfigError::UnknownPattern(s.to_string()))
    }
}

/// The largest size a random allocation may have: a quarter of the budget.
fn max_alloc_size(trace: &Trace) -> usize {
    trace.config().budget() / 4
}

/// Try to allocate a random size into a random free slot.
///
/// Returns `false` when there was no free slot to pick; a rejected attempt on
/// a chosen slot still returns `true`.
fn random_alloc<C>(trace: &mut Trace, chooser: &mut C) -> bool
where
    C: Chooser + ?Sized,
{
    let free = trace.slots().free_indices();
    let Some(index) = chooser.choose_index(&free) else {
        return false;
    };
    let size = chooser.size_in_range(MIN_ALLOC_SIZE, max_alloc_size(trace));
    let _ = trace.alloc(index, size);
    true
}

/// Try to free a random live slot.
///
/// Returns `false` when there was no live slot to pick.
fn random_free<C>(trace: &mut Trace, chooser: &mut C) -> bool
where
    C: Chooser + ?Sized,
{
    let live = trace.slots().live_indices();
    let Some(index) = chooser.choose_index(&live) else {
        return false;
    };
    let _ = trace.free(index);
    true
}

/// Attempt up to `max_active_slots` random allocations, stopping early once
/// no slot is free or no allocation could possibly fit in the budget.
fn saturate<C>(trace: &mut Trace, chooser: &mut C, max_active_slots: usize)
where
    C: Chooser + ?Sized,
{
    for _ in 0..max_active_slots {
        if trace.slots().remaining_budget() < MIN_ALLOC_SIZE {
            break;
        }
        if !random_alloc(trace, chooser) {
            break;
        }
    }
    log::debug!(
        "saturated {} slots holding {} of {} bytes",
        trace.slots().live_count(),
        trace.slots().live_bytes(),
        trace.slots().budget(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AllocatorKind, Config, Event, RandomChooser, ScriptedChooser};

    #[test]
    fn pattern_names_round_trip() {
        for pattern in Pattern::ALL {
            assert_eq!(pattern.to_string().parse::<Pattern>(), Ok(pattern));
        }
        assert_eq!(
            "spike".parse::<Pattern>(),
            Err(ConfigError::UnknownPattern("spike".into()))
        );
    }

    #[test]
    fn random_alloc_uses_free_slot_and_size_range() {
        let mut trace = Trace::new(Config::standard(AllocatorKind::Buddy));
        trace.alloc(0, 100).unwrap();
        // Free slots are 1..16, so index 2 picks slot 3. Size 16 + 34.
        let mut chooser = ScriptedChooser::new([2, 34]);
        assert!(random_alloc(&mut trace, &mut chooser));
        assert_eq!(trace.events()[1], Event::Alloc { index: 3, size: 50 });
    }

    #[test]
    fn random_ops_on_exhausted_tables() {
        let config = Config::buddy(2000, 0).unwrap();
        let mut trace = Trace::new(config);
        let mut chooser = RandomChooser::new(0);
        assert!(!random_free(&mut trace, &mut chooser));
        trace.alloc(0, 16).unwrap();
        assert!(!random_alloc(&mut trace, &mut chooser));
        assert!(random_free(&mut trace, &mut chooser));
        assert_eq!(trace.slots().live_count(), 0);
    }

    #[test]
    fn saturate_stops_when_budget_exhausted() {
        let mut trace = Trace::new(Config::standard(AllocatorKind::Buddy));
        trace.alloc(15, 1990).unwrap();
        let mut chooser = ScriptedChooser::new([]);
        saturate(&mut trace, &mut chooser, 8);
        assert_eq!(trace.events().len(), 1);
        assert_eq!(chooser.consumed(), 0);
    }

    #[test]
    fn every_pattern_reaches_target() {
        let _ = env_logger::try_init();
        let mut chooser = RandomChooser::new(0x5eed);
        for kind in AllocatorKind::ALL {
            for pattern in Pattern::ALL {
                let config = Config::standard(kind);
                let mut trace = Trace::new(config);
                pattern.run(&mut trace, &mut chooser, config.max_active_slots());
                assert_eq!(trace.len(), trace.target(), "{pattern} / {kind}");
            }
        }
    }
}
