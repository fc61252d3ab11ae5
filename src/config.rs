//! Per-trace configuration: which allocator family a trace targets and how
//! much capacity it may use.

use core::fmt;
use core::str::FromStr;

/// Errors produced while building a [`Config`] or parsing configuration names.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A slab configuration must have at least one slot.
    #[error("a slab configuration needs at least one slot")]
    ZeroSlots,

    /// A slab configuration must have a non-zero unit size.
    #[error("a slab configuration needs a non-zero unit size")]
    ZeroUnitSize,

    /// The total memory budget must be non-zero.
    #[error("the memory budget must be non-zero")]
    ZeroBudget,

    /// The level count does not produce a representable slot count.
    #[error("{0} levels is too many to build a slot table from")]
    TooManyLevels(u32),

    /// `unit_size * num_slots` does not fit in a `usize`.
    #[error("slab budget overflows: {unit_size} * {num_slots}")]
    BudgetOverflow {
        /// The requested unit size.
        unit_size: usize,
        /// The requested number of slots.
        num_slots: usize,
    },

    /// An allocator kind name that is not `slab`, `buddy`, or `bitmap`.
    #[error("unknown allocator kind `{0}`")]
    UnknownKind(String),

    /// A pattern name that is not `ramp`, `peak`, or `plateau`.
    #[error("unknown workload pattern `{0}`")]
    UnknownPattern(String),
}

/// The allocator family a trace is written for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AllocatorKind {
    /// Fixed-size slab allocator. Allocation lines carry no size.
    Slab,
    /// Buddy allocator.
    Buddy,
    /// Bitmap-backed buddy allocator.
    Bitmap,
}

impl AllocatorKind {
    /// Every allocator kind, in the order the driver emits them.
    pub const ALL: [AllocatorKind; 3] = [
        AllocatorKind::Slab,
        AllocatorKind::Buddy,
        AllocatorKind::Bitmap,
    ];

    /// The name used in `i,<kind>` lines and output file names.
    pub fn name(self) -> &'static str {
        match self {
            AllocatorKind::Slab => "slab",
            AllocatorKind::Buddy => "buddy",
            AllocatorKind::Bitmap => "bitmap",
        }
    }

    /// Do allocation lines for this kind carry an explicit size?
    pub fn has_sized_allocs(self) -> bool {
        !matches!(self, AllocatorKind::Slab)
    }
}

impl fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AllocatorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AllocatorKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ConfigError::UnknownKind(s.to_string()))
    }
}

/// How the slot table's capacity is described on the `p` line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capacity {
    /// A slab of `num_slots` units of `unit_size` bytes each.
    Slab {
        /// Size of every slab unit, in bytes.
        unit_size: usize,
        /// Number of slab units, which is also the slot count.
        num_slots: usize,
    },
    /// A buddy-style allocator with `levels` levels and `2^levels` slots.
    Leveled {
        /// Number of buddy levels.
        levels: u32,
    },
}

/// Immutable configuration for generating a single trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    kind: AllocatorKind,
    budget: usize,
    capacity: Capacity,
    slot_count: usize,
}

/// Slab unit size used by [`Config::standard`].
pub const STANDARD_SLAB_UNIT_SIZE: usize = 64;

/// Slab unit count used by [`Config::standard`].
pub const STANDARD_SLAB_SLOTS: usize = 1000;

/// Buddy and bitmap budget used by [`Config::standard`].
pub const STANDARD_LEVELED_BUDGET: usize = 2000;

/// Buddy and bitmap level count used by [`Config::standard`].
pub const STANDARD_LEVELS: u32 = 4;

/// Budget of the default size-class sweep configuration.
pub const SWEEP_BUDGET: usize = 16276;

/// Level count of the default size-class sweep configuration.
pub const SWEEP_LEVELS: u32 = 10;

impl Config {
    /// A slab configuration: `num_slots` units of `unit_size` bytes, for a
    /// budget of `unit_size * num_slots`.
    pub fn slab(unit_size: usize, num_slots: usize) -> Result<Self, ConfigError> {
        if num_slots == 0 {
            return Err(ConfigError::ZeroSlots);
        }
        if unit_size == 0 {
            return Err(ConfigError::ZeroUnitSize);
        }
        let budget = unit_size
            .checked_mul(num_slots)
            .ok_or(ConfigError::BudgetOverflow {
                unit_size,
                num_slots,
            })?;
        Ok(Config {
            kind: AllocatorKind::Slab,
            budget,
            capacity: Capacity::Slab {
                unit_size,
                num_slots,
            },
            slot_count: num_slots,
        })
    }

    /// A buddy allocator configuration with `2^levels` slots.
    pub fn buddy(budget: usize, levels: u32) -> Result<Self, ConfigError> {
        Self::leveled(AllocatorKind::Buddy, budget, levels)
    }

    /// A bitmap allocator configuration with `2^levels` slots.
    pub fn bitmap(budget: usize, levels: u32) -> Result<Self, ConfigError> {
        Self::leveled(AllocatorKind::Bitmap, budget, levels)
    }

    /// A level-parameterized configuration for `kind`.
    ///
    /// Passing [`AllocatorKind::Slab`] builds a slab configuration with
    /// `2^levels` units that evenly divide `budget`, so that the declared
    /// budget stays exact.
    pub fn leveled(kind: AllocatorKind, budget: usize, levels: u32) -> Result<Self, ConfigError> {
        if budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        // Keep the slot table to a sane size; 2^31 entries is already absurd.
        if levels >= 32 {
            return Err(ConfigError::TooManyLevels(levels));
        }
        let slot_count = 1usize << levels;
        if kind == AllocatorKind::Slab {
            return Self::slab(budget / slot_count, slot_count);
        }
        Ok(Config {
            kind,
            budget,
            capacity: Capacity::Leveled { levels },
            slot_count,
        })
    }

    /// The configuration the driver uses for `kind`.
    ///
    /// * slab: 1000 units of 64 bytes (budget 64000).
    /// * buddy, bitmap: budget 2000 with 4 levels (16 slots).
    pub fn standard(kind: AllocatorKind) -> Self {
        match kind {
            AllocatorKind::Slab => Config {
                kind,
                budget: STANDARD_SLAB_UNIT_SIZE * STANDARD_SLAB_SLOTS,
                capacity: Capacity::Slab {
                    unit_size: STANDARD_SLAB_UNIT_SIZE,
                    num_slots: STANDARD_SLAB_SLOTS,
                },
                slot_count: STANDARD_SLAB_SLOTS,
            },
            AllocatorKind::Buddy | AllocatorKind::Bitmap => Config {
                kind,
                budget: STANDARD_LEVELED_BUDGET,
                capacity: Capacity::Leveled {
                    levels: STANDARD_LEVELS,
                },
                slot_count: 1 << STANDARD_LEVELS,
            },
        }
    }

    /// The configuration the size-class sweep uses by default: a bitmap
    /// allocator with a 16276-byte budget and 10 levels (1024 slots).
    pub fn standard_sweep() -> Self {
        Config {
            kind: AllocatorKind::Bitmap,
            budget: SWEEP_BUDGET,
            capacity: Capacity::Leveled {
                levels: SWEEP_LEVELS,
            },
            slot_count: 1 << SWEEP_LEVELS,
        }
    }

    /// The allocator kind this trace targets.
    pub fn kind(&self) -> AllocatorKind {
        self.kind
    }

    /// The total number of bytes that may be live at once.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// The capacity description.
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Number of addressable slots.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// The default cap on simultaneously active slots that patterns aim for.
    pub fn max_active_slots(&self) -> usize {
        self.slot_count / 2
    }

    /// The two values written on the `p` line.
    pub fn params(&self) -> (usize, usize) {
        match self.capacity {
            Capacity::Slab {
                unit_size,
                num_slots,
            } => (unit_size, num_slots),
            Capacity::Leveled { levels } => (self.budget, levels as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_configs() {
        let slab = Config::standard(AllocatorKind::Slab);
        assert_eq!(slab.budget(), 64000);
        assert_eq!(slab.slot_count(), 1000);
        assert_eq!(slab.max_active_slots(), 500);
        assert_eq!(slab.params(), (64, 1000));

        for kind in [AllocatorKind::Buddy, AllocatorKind::Bitmap] {
            let config = Config::standard(kind);
            assert_eq!(config.kind(), kind);
            assert_eq!(config.budget(), 2000);
            assert_eq!(config.slot_count(), 16);
            assert_eq!(config.max_active_slots(), 8);
            assert_eq!(config.params(), (2000, 4));
        }
    }

    #[test]
    fn standard_matches_constructors() {
        assert_eq!(
            Config::slab(64, 1000),
            Ok(Config::standard(AllocatorKind::Slab))
        );
        assert_eq!(
            Config::buddy(2000, 4),
            Ok(Config::standard(AllocatorKind::Buddy))
        );
        assert_eq!(
            Config::bitmap(2000, 4),
            Ok(Config::standard(AllocatorKind::Bitmap))
        );
        assert_eq!(Config::bitmap(16276, 10), Ok(Config::standard_sweep()));
    }

    #[test]
    fn invalid_configs() {
        assert_eq!(Config::slab(64, 0), Err(ConfigError::ZeroSlots));
        assert_eq!(Config::slab(0, 10), Err(ConfigError::ZeroUnitSize));
        assert_eq!(Config::buddy(0, 4), Err(ConfigError::ZeroBudget));
        assert_eq!(Config::bitmap(100, 40), Err(ConfigError::TooManyLevels(40)));
        assert!(matches!(
            Config::slab(usize::MAX, 2),
            Err(ConfigError::BudgetOverflow { .. })
        ));
    }

    #[test]
    fn leveled_slab_splits_budget() {
        let config = Config::leveled(AllocatorKind::Slab, 1024, 4).unwrap();
        assert_eq!(config.kind(), AllocatorKind::Slab);
        assert_eq!(config.params(), (64, 16));
        assert_eq!(config.budget(), 1024);
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in AllocatorKind::ALL {
            assert_eq!(kind.to_string().parse::<AllocatorKind>(), Ok(kind));
        }
        assert_eq!(
            "arena".parse::<AllocatorKind>(),
            Err(ConfigError::UnknownKind("arena".into()))
        );
        assert!(!AllocatorKind::Slab.has_sized_allocs());
        assert!(AllocatorKind::Buddy.has_sized_allocs());
    }
}
