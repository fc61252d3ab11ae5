//! The random filler that pads every trace to its target line count.

use super::{random_alloc, random_free};
use crate::{Chooser, Trace};

/// How many attempts per target line the balancer makes before giving up.
pub const ATTEMPTS_PER_LINE: usize = 64;

/// Pad `trace` to its target line count with random allocations and frees.
///
/// Each attempt flips a fair coin between allocating into a random free slot
/// and freeing a random live slot. Rejected attempts add no line. The balancer
/// gives up after `ATTEMPTS_PER_LINE * target` attempts, leaving a shorter but
/// still legal trace.
pub fn balance<C>(trace: &mut Trace, chooser: &mut C)
where
    C: Chooser + ?Sized,
{
    let max_attempts = trace.target().saturating_mul(ATTEMPTS_PER_LINE);
    let mut attempts = 0;
    while !trace.is_full() {
        if attempts == max_attempts {
            log::warn!(
                "balancer gave up after {attempts} attempts at {} of {} lines",
                trace.len(),
                trace.target()
            );
            return;
        }
        attempts += 1;
        if chooser.coin_flip() {
            random_alloc(trace, chooser);
        } else {
            random_free(trace, chooser);
        }
    }
    log::debug!("balanced trace to {} lines in {attempts} attempts", trace.len());
}
