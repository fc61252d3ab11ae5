//! Traces: the ordered allocate/free events accepted for one configuration,
//! and their line-oriented text encoding.

use crate::{AllocatorKind, Config, Rejected, SlotTable};
use core::fmt;
use std::io;

/// The number of lines, header included, that generated traces are padded to.
pub const TARGET_LINE_COUNT: usize = 1000;

/// Lines taken up by the `i` and `p` header.
pub const HEADER_LINES: usize = 2;

/// Why a trace refused an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refused {
    /// The trace already holds its target number of lines.
    Full,
    /// The slot table rejected the event.
    Slot(Rejected),
}

impl From<Rejected> for Refused {
    fn from(why: Rejected) -> Self {
        Refused::Slot(why)
    }
}

/// An accepted allocation or free.
///
/// Events always record the allocation size, even for slab traces whose
/// rendered lines omit it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// Slot `index` became live with `size` bytes.
    Alloc {
        /// Slot index.
        index: usize,
        /// Allocation size in bytes.
        size: usize,
    },
    /// Slot `index` became empty.
    Free {
        /// Slot index.
        index: usize,
    },
}

/// One line of the text encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceLine {
    /// `i,<kind>`
    Init(AllocatorKind),
    /// `p,<param1>,<param2>`
    Param(usize, usize),
    /// `a,<index>[,<size>]`
    Alloc {
        /// Slot index.
        index: usize,
        /// Present unless the trace is for a slab allocator.
        size: Option<usize>,
    },
    /// `f,<index>`
    Free {
        /// Slot index.
        index: usize,
    },
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TraceLine::Init(kind) => write!(f, "i,{kind}"),
            TraceLine::Param(a, b) => write!(f, "p,{a},{b}"),
            TraceLine::Alloc {
                index,
                size: Some(size),
            } => write!(f, "a,{index},{size}"),
            TraceLine::Alloc { index, size: None } => write!(f, "a,{index}"),
            TraceLine::Free { index } => write!(f, "f,{index}"),
        }
    }
}

/// A trace under construction.
///
/// Every allocation and free goes through the trace's [`SlotTable`], so the
/// events it accepts are always legal. Once the trace reaches its target line
/// count, further events are refused with [`Refused::Full`].
#[derive(Clone, Debug)]
pub struct Trace {
    config: Config,
    slots: SlotTable,
    events: Vec<Event>,
    target: usize,
}

impl Trace {
    /// An empty trace for `config`, capped at [`TARGET_LINE_COUNT`] lines.
    pub fn new(config: Config) -> Self {
        Self::with_target(config, TARGET_LINE_COUNT)
    }

    /// An empty trace for `config`, capped at `target` lines including the
    /// header.
    ///
    /// The header is always written, so a `target` below [`HEADER_LINES`] is
    /// raised to it.
    pub fn with_target(config: Config, target: usize) -> Self {
        Trace {
            slots: SlotTable::new(config.slot_count(), config.budget()),
            config,
            events: Vec::new(),
            target: target.max(HEADER_LINES),
        }
    }

    /// The configuration this trace is generated for.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current slot state.
    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    /// Accepted events, in order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// The line count this trace is capped at.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Number of lines the rendered trace has, header included.
    pub fn len(&self) -> usize {
        HEADER_LINES + self.events.len()
    }

    /// Has no event been accepted yet?
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Has the trace reached its target line count?
    pub fn is_full(&self) -> bool {
        self.len() >= self.target
    }

    /// Allocate `size` bytes into slot `index`.
    pub fn alloc(&mut self, index: usize, size: usize) -> Result<(), Refused> {
        self.check_room()?;
        self.slots
            .try_allocate(index, size)
            .inspect_err(|why| log::trace!("alloc slot {index} ({size} bytes) rejected: {why:?}"))?;
        self.events.push(Event::Alloc { index, size });
        Ok(())
    }

    /// Free slot `index`.
    pub fn free(&mut self, index: usize) -> Result<(), Refused> {
        self.check_room()?;
        self.slots
            .try_free(index)
            .inspect_err(|why| log::trace!("free slot {index} rejected: {why:?}"))?;
        self.events.push(Event::Free { index });
        Ok(())
    }

    fn check_room(&self) -> Result<(), Refused> {
        if self.is_full() {
            Err(Refused::Full)
        } else {
            Ok(())
        }
    }

    /// The trace's lines: header first, then one line per event.
    pub fn lines(&self) -> impl Iterator<Item = TraceLine> + '_ {
        let kind = self.config.kind();
        let (p1, p2) = self.config.params();
        let sized = kind.has_sized_allocs();
        [TraceLine::Init(kind), TraceLine::Param(p1, p2)]
            .into_iter()
            .chain(self.events.iter().map(move |event| match *event {
                Event::Alloc { index, size } => TraceLine::Alloc {
                    index,
                    size: sized.then_some(size),
                },
                Event::Free { index } => TraceLine::Free { index },
            }))
    }

    /// Write the trace's lines, separated by newlines, to `w`.
    ///
    /// No newline follows the final line.
    pub fn write_to(&self, mut w: impl io::Write) -> io::Result<()> {
        for (i, line) in self.lines().enumerate() {
            if i > 0 {
                w.write_all(b"\n")?;
            }
            write!(w, "{line}")?;
        }
        Ok(())
    }

    /// Render the trace to a string, as [`Trace::write_to`] would.
    pub fn render(&self) -> String {
        let lines: Vec<String> = self.lines().map(|line| line.to_string()).collect();
        lines.join("\n")
    }
}
