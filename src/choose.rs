//! Sources of the random choices that shape a trace.
//!
//! Patterns never draw randomness on their own. Every index, size, and coin
//! flip comes from a [`Chooser`], so tests can replace the random source with a
//! seeded or fully scripted one.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// A source of choices for trace generation.
///
/// Only [`Chooser::gen_index`] is required; everything else is derived from
/// it.
pub trait Chooser {
    /// Pick a uniformly random index in `0..len`, or `None` if `len` is zero.
    fn gen_index(&mut self, len: usize) -> Option<usize>;

    /// Pick one of `candidates`, or `None` if there are none.
    fn choose_index(&mut self, candidates: &[usize]) -> Option<usize> {
        let i = self.gen_index(candidates.len())?;
        candidates.get(i).copied()
    }

    /// Pick a size in the inclusive range `lo..=hi`.
    ///
    /// An inverted range yields `lo`.
    fn size_in_range(&mut self, lo: usize, hi: usize) -> usize {
        if hi <= lo {
            return lo;
        }
        match (hi - lo).checked_add(1) {
            Some(span) => lo + self.gen_index(span).unwrap_or(0),
            None => lo,
        }
    }

    /// A fair coin flip.
    fn coin_flip(&mut self) -> bool {
        self.gen_index(2) == Some(0)
    }

    /// A uniformly random subset of `candidates` of size `min(k, len)`.
    ///
    /// The subset is returned in selection order.
    fn sample(&mut self, candidates: &[usize], k: usize) -> Vec<usize> {
        let mut pool = candidates.to_vec();
        let k = k.min(pool.len());
        // Partial Fisher-Yates: after step `i`, `pool[..=i]` is the sample.
        for i in 0..k {
            let j = i + self.gen_index(pool.len() - i).unwrap_or(0);
            pool.swap(i, j);
        }
        pool.truncate(k);
        pool
    }
}

impl<C> Chooser for &mut C
where
    C: Chooser + ?Sized,
{
    fn gen_index(&mut self, len: usize) -> Option<usize> {
        (**self).gen_index(len)
    }
}

/// Random choices from a pseudo-random generator.
#[derive(Clone, Debug)]
pub struct RandomChooser {
    rng: SmallRng,
}

impl RandomChooser {
    /// A chooser whose choices are fully determined by `seed`.
    pub fn new(seed: u64) -> Self {
        RandomChooser {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// A chooser seeded from operating-system entropy, so that each run
    /// produces different traces.
    pub fn from_entropy() -> Self {
        log::debug!("seeding trace generator from OS entropy");
        RandomChooser {
            rng: SmallRng::from_entropy(),
        }
    }
}

impl Chooser for RandomChooser {
    fn gen_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.rng.gen_range(0..len))
        }
    }
}

/// Choices replayed from a fixed script.
///
/// Each script entry is reduced modulo the number of options at the point it
/// is consumed. Once the script runs out, every choice picks the first option.
#[derive(Clone, Debug, Default)]
pub struct ScriptedChooser {
    script: Vec<u32>,
    position: usize,
}

impl ScriptedChooser {
    /// Create a chooser that replays `script`.
    pub fn new(script: impl IntoIterator<Item = u32>) -> Self {
        ScriptedChooser {
            script: script.into_iter().collect(),
            position: 0,
        }
    }

    /// How many script entries have been consumed so far.
    pub fn consumed(&self) -> usize {
        self.position
    }
}

impl Chooser for ScriptedChooser {
    fn gen_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let raw = match self.script.get(self.position) {
            Some(&raw) => {
                self.position += 1;
                raw as usize
            }
            None => 0,
        };
        Some(raw % len)
    }
}
