//! Shared fuzzing and testing infrastructure for `workload_traces`.

use mutatis::{mutators as m, DefaultMutate, Mutate};
use std::collections::BTreeMap;
use workload_traces::patterns::sweep;
use workload_traces::{
    AllocatorKind, Config, Event, Pattern, ScriptedChooser, Trace, TraceLine, HEADER_LINES,
};

macro_rules! ensure {
    ( $cond:expr , $msg:expr $( , $args:expr )* $(,)? ) => {{
        let cond = $cond;
        if !cond {
            let msg = format!($msg $( , $args )* );
            let str_cond = stringify!($cond);
            return Err(format!("check failed: `{str_cond}`: {msg}"));
        }
    }};
}

/// Parse a single line of the trace text format.
pub fn parse_line(line: &str) -> Result<TraceLine, String> {
    let fields: Vec<&str> = line.split(',').collect();
    let num = |s: &str| -> Result<usize, String> {
        s.parse()
            .map_err(|e| format!("bad number `{s}` in line `{line}`: {e}"))
    };
    match fields.as_slice() {
        ["i", kind] => kind
            .parse::<AllocatorKind>()
            .map(TraceLine::Init)
            .map_err(|e| e.to_string()),
        ["p", a, b] => Ok(TraceLine::Param(num(*a)?, num(*b)?)),
        ["a", index] => Ok(TraceLine::Alloc {
            index: num(*index)?,
            size: None,
        }),
        ["a", index, size] => Ok(TraceLine::Alloc {
            index: num(*index)?,
            size: Some(num(*size)?),
        }),
        ["f", index] => Ok(TraceLine::Free { index: num(*index)? }),
        _ => Err(format!("malformed trace line `{line}`")),
    }
}

/// Parse a whole rendered trace.
pub fn parse_trace(text: &str) -> Result<Vec<TraceLine>, String> {
    text.lines().map(parse_line).collect()
}

/// The set of currently-live slots while replaying a trace.
struct LiveSlots {
    /// Live size per slot index. Slab traces record `None` sizes.
    map: BTreeMap<usize, Option<usize>>,

    /// The total number of bytes that are currently allocated.
    total_allocated_bytes: usize,

    /// The total allocated bytes should never surpass this limit.
    budget: usize,
}

impl LiveSlots {
    fn new(budget: usize) -> Self {
        LiveSlots {
            map: BTreeMap::default(),
            total_allocated_bytes: 0,
            budget,
        }
    }

    fn alloc(&mut self, line_no: usize, index: usize, size: Option<usize>) -> Result<(), String> {
        ensure!(
            !self.map.contains_key(&index),
            "line {line_no}: slot {index} allocated while live",
        );
        if let Some(size) = size {
            ensure!(size > 0, "line {line_no}: zero-sized allocation");
            self.total_allocated_bytes += size;
            ensure!(
                self.total_allocated_bytes <= self.budget,
                "line {line_no}: {} live bytes exceed the budget of {}",
                self.total_allocated_bytes,
                self.budget,
            );
        }
        self.map.insert(index, size);
        Ok(())
    }

    fn free(&mut self, line_no: usize, index: usize) -> Result<(), String> {
        let Some(size) = self.map.remove(&index) else {
            return Err(format!("line {line_no}: slot {index} freed while not live"));
        };
        self.total_allocated_bytes -= size.unwrap_or(0);
        Ok(())
    }
}

/// Check the rendered text of a trace.
///
/// * The first line is the only `i` line and the second is the only `p` line.
/// * At most `max_lines` lines.
/// * Slot indices are within the declared capacity.
/// * Allocations and frees of every slot strictly alternate, starting with an
///   allocation.
/// * Slab allocations carry no size; other allocations do, and the live total
///   never exceeds the declared budget.
pub fn check_text(text: &str, max_lines: usize) -> Result<(), String> {
    let lines = parse_trace(text)?;
    ensure!(
        lines.len() <= max_lines,
        "trace has {} lines, more than {max_lines}",
        lines.len(),
    );
    ensure!(lines.len() >= HEADER_LINES, "trace is missing its header");

    let TraceLine::Init(kind) = lines[0] else {
        return Err(format!("first line is not an `i` line: {:?}", lines[0]));
    };
    let TraceLine::Param(p1, p2) = lines[1] else {
        return Err(format!("second line is not a `p` line: {:?}", lines[1]));
    };
    let (budget, slot_count) = match kind {
        AllocatorKind::Slab => (p1.saturating_mul(p2), p2),
        AllocatorKind::Buddy | AllocatorKind::Bitmap => {
            ensure!(p2 < 32, "level count {p2} is too large");
            (p1, 1usize << p2)
        }
    };

    let mut live = LiveSlots::new(budget);
    for (i, line) in lines.iter().enumerate().skip(HEADER_LINES) {
        let line_no = i + 1;
        match *line {
            TraceLine::Alloc { index, size } => {
                ensure!(index < slot_count, "line {line_no}: slot {index} out of range");
                ensure!(
                    size.is_some() == kind.has_sized_allocs(),
                    "line {line_no}: size field presence is wrong for {kind}",
                );
                live.alloc(line_no, index, size)?;
            }
            TraceLine::Free { index } => {
                ensure!(index < slot_count, "line {line_no}: slot {index} out of range");
                live.free(line_no, index)?;
            }
            TraceLine::Init(_) | TraceLine::Param(..) => {
                return Err(format!("line {line_no}: header line after the header"));
            }
        }
    }
    Ok(())
}

/// Check an in-memory trace: its events, including the slab sizes that the
/// text format omits, and its rendering.
pub fn check_trace(trace: &Trace) -> Result<(), String> {
    let config = trace.config();
    ensure!(
        trace.len() <= trace.target(),
        "trace has {} lines, more than its target of {}",
        trace.len(),
        trace.target(),
    );

    let mut live = LiveSlots::new(config.budget());
    for (i, event) in trace.events().iter().enumerate() {
        let line_no = HEADER_LINES + i + 1;
        match *event {
            Event::Alloc { index, size } => {
                ensure!(
                    index < config.slot_count(),
                    "line {line_no}: slot {index} out of range",
                );
                live.alloc(line_no, index, Some(size))?;
            }
            Event::Free { index } => live.free(line_no, index)?,
        }
    }
    ensure!(
        live.total_allocated_bytes == trace.slots().live_bytes(),
        "replayed live bytes {} disagree with the slot table's {}",
        live.total_allocated_bytes,
        trace.slots().live_bytes(),
    );

    let text = trace.render();
    check_text(&text, trace.target())?;
    let reparsed = parse_trace(&text)?;
    let lines: Vec<TraceLine> = trace.lines().collect();
    ensure!(reparsed == lines, "rendered trace does not parse back to its lines");
    Ok(())
}

/// A fuzz case: which trace to generate, and the choices to generate it with.
#[derive(Clone, Debug, Default)]
pub struct Case {
    /// Pattern selector; `3` runs the size-class sweep.
    pub pattern: u8,
    /// Allocator kind selector.
    pub kind: u8,
    /// Custom budget, or `0` for the kind's standard configuration.
    pub budget: u16,
    /// Custom level count, used with a custom budget.
    pub levels: u8,
    /// Target line count beyond the header.
    pub target: u16,
    /// Scripted choices.
    pub choices: Vec<u32>,
}

const fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

impl Case {
    /// Decode a case from fuzzer input.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let ((pattern, kind, budget, levels, target, choices), _) =
            bincode::decode_from_slice::<(u8, u8, u16, u8, u16, Vec<u32>), _>(
                data,
                bincode_config(),
            )
            .ok()?;
        Some(Case {
            pattern,
            kind,
            budget,
            levels,
            target,
            choices,
        })
    }

    /// Encode this case into `data`, returning the encoded length, or `None`
    /// if it does not fit.
    pub fn encode_into(&self, data: &mut [u8]) -> Option<usize> {
        let tuple = (
            self.pattern,
            self.kind,
            self.budget,
            self.levels,
            self.target,
            self.choices.clone(),
        );
        bincode::encode_into_slice(tuple, data, bincode_config()).ok()
    }

    /// Drop the last scripted choice. Returns `false` if there were none.
    pub fn pop(&mut self) -> bool {
        self.choices.pop().is_some()
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::ALL[self.kind as usize % AllocatorKind::ALL.len()]
    }

    /// The configuration this case generates a trace for.
    pub fn config(&self) -> Config {
        let kind = self.kind();
        if self.budget == 0 {
            return Config::standard(kind);
        }
        Config::leveled(kind, self.budget.into(), u32::from(self.levels % 11))
            .unwrap_or_else(|_| Config::standard(kind))
    }

    /// Generate this case's trace.
    pub fn generate(&self) -> Trace {
        let config = self.config();
        let target = HEADER_LINES + usize::from(self.target % 1000);
        let mut trace = Trace::with_target(config, target);
        let mut chooser = ScriptedChooser::new(self.choices.iter().copied());
        match Pattern::ALL.get(self.pattern as usize % (Pattern::ALL.len() + 1)) {
            Some(pattern) => pattern.run(&mut trace, &mut chooser, config.max_active_slots()),
            None => sweep::sweep(&mut trace, &mut chooser),
        }
        trace
    }

    /// Generate this case's trace and check it.
    pub fn run(&self) -> Result<(), String> {
        log::debug!("========== Running {self:?} ==========");
        let trace = self.generate();
        check_trace(&trace)
    }
}

impl DefaultMutate for Case {
    type DefaultMutate = CaseMutator;
}

/// The default mutator for [`Case`]s.
#[derive(Default)]
pub struct CaseMutator;

impl Mutate<Case> for CaseMutator {
    fn mutate(&mut self, c: &mut mutatis::Candidates<'_>, case: &mut Case) -> mutatis::Result<()> {
        m::default::<u8>().mutate(c, &mut case.pattern)?;
        m::default::<u8>().mutate(c, &mut case.kind)?;
        m::default::<u16>().mutate(c, &mut case.budget)?;
        m::default::<u8>().mutate(c, &mut case.levels)?;
        m::default::<u16>().mutate(c, &mut case.target)?;
        m::default::<Vec<u32>>().mutate(c, &mut case.choices)?;

        // Zeroed choices always pick the lowest slot and the smallest size,
        // which piles allocations onto the same few slots.
        c.mutation(|ctx| {
            if let Some(i) = ctx.rng().gen_index(case.choices.len()) {
                case.choices[i] = 0;
            }
            Ok(())
        })?;

        // Go back to a standard configuration.
        if c.shrink() {
            c.mutation(|_ctx| {
                case.budget = 0;
                Ok(())
            })?;
        }

        Ok(())
    }
}
