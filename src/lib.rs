#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod choose;
pub mod config;
pub mod driver;
pub mod patterns;
mod slots;
mod trace;

pub use choose::{Chooser, RandomChooser, ScriptedChooser};
pub use config::{AllocatorKind, Capacity, Config, ConfigError};
pub use driver::Driver;
pub use patterns::{Pattern, MIN_ALLOC_SIZE};
pub use slots::{Rejected, SlotTable};
pub use trace::{Event, Refused, Trace, TraceLine, HEADER_LINES, TARGET_LINE_COUNT};
