//! The batch driver: one trace per (pattern, allocator kind) pair, written to
//! an output directory.

use crate::patterns::sweep;
use crate::{
    AllocatorKind, Chooser, Config, Pattern, RandomChooser, Trace, HEADER_LINES, TARGET_LINE_COUNT,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The directory traces are written to by default.
pub const DEFAULT_OUTPUT_DIR: &str = "./benchmarks";

/// Every generated trace's file name starts with this prefix.
pub const OUTPUT_PREFIX: &str = "generated_";

/// Every generated trace's file name ends with this extension.
pub const OUTPUT_EXTENSION: &str = "alloc";

/// File name of the size-class sweep trace.
pub const SWEEP_FILE_NAME: &str = "trace.alloc";

/// Errors that can occur while writing traces.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Creating, listing, or writing in the output directory failed.
    #[error("failed to {action} `{}`: {source}", path.display())]
    Io {
        /// What the driver was doing.
        action: &'static str,
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

fn io_error<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Error + 'a {
    move |source| Error::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// The file name for the trace of `pattern` against `kind`:
/// `generated_<kind>_<pattern>.alloc`.
pub fn file_name(kind: AllocatorKind, pattern: Pattern) -> String {
    format!("{OUTPUT_PREFIX}{kind}_{pattern}.{OUTPUT_EXTENSION}")
}

/// Is `name` a file name this driver generates?
fn is_generated(name: &str) -> bool {
    name.starts_with(OUTPUT_PREFIX)
        && Path::new(name).extension().and_then(|e| e.to_str()) == Some(OUTPUT_EXTENSION)
}

/// Generates the full set of traces.
///
/// A single chooser is shared by every trace the driver generates.
#[derive(Debug)]
pub struct Driver<C = RandomChooser> {
    output_dir: PathBuf,
    chooser: C,
    target: usize,
}

impl Driver<RandomChooser> {
    /// A driver writing to `output_dir` with a freshly seeded random chooser.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_chooser(output_dir, RandomChooser::from_entropy())
    }
}

impl<C> Driver<C>
where
    C: Chooser,
{
    /// A driver writing to `output_dir` and drawing choices from `chooser`.
    pub fn with_chooser(output_dir: impl Into<PathBuf>, chooser: C) -> Self {
        Driver {
            output_dir: output_dir.into(),
            chooser,
            target: TARGET_LINE_COUNT,
        }
    }

    /// Pad traces to `target` lines instead of [`TARGET_LINE_COUNT`].
    ///
    /// Every trace carries its two header lines, so targets below
    /// [`HEADER_LINES`] are raised to it.
    pub fn target(mut self, target: usize) -> Self {
        self.target = target.max(HEADER_LINES);
        self
    }

    /// The directory traces are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the trace for `pattern` against `kind` is written.
    pub fn output_path(&self, kind: AllocatorKind, pattern: Pattern) -> PathBuf {
        self.output_dir.join(file_name(kind, pattern))
    }

    /// Generate the trace for `pattern` against `kind`'s standard
    /// configuration, without writing it anywhere.
    pub fn generate(&mut self, kind: AllocatorKind, pattern: Pattern) -> Trace {
        let config = Config::standard(kind);
        let mut trace = Trace::with_target(config, self.target);
        pattern.run(&mut trace, &mut self.chooser, config.max_active_slots());
        if !trace.is_full() {
            log::warn!(
                "{pattern}/{kind} trace is short: {} of {} lines",
                trace.len(),
                trace.target()
            );
        }
        trace
    }

    /// Remove previously generated traces from the output directory.
    ///
    /// Only files named like `generated_*.alloc` are removed. A missing output
    /// directory has nothing to clear. Returns how many files were removed.
    pub fn clear_outputs(&self) -> Result<usize, Error> {
        let entries = match fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_error("list", &self.output_dir)(e)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(io_error("list", &self.output_dir))?;
            let path = entry.path();
            let generated = entry.file_name().to_str().is_some_and(is_generated);
            if generated && path.is_file() {
                log::debug!("removing stale trace {}", path.display());
                fs::remove_file(&path).map_err(io_error("remove", &path))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Clear stale outputs, then generate and write the trace of every pattern
    /// against every allocator kind.
    ///
    /// Returns the paths written, in generation order.
    pub fn run(&mut self) -> Result<Vec<PathBuf>, Error> {
        let removed = self.clear_outputs()?;
        if removed > 0 {
            log::info!("removed {removed} stale traces");
        }
        fs::create_dir_all(&self.output_dir).map_err(io_error("create", &self.output_dir))?;

        let mut written = Vec::with_capacity(Pattern::ALL.len() * AllocatorKind::ALL.len());
        for pattern in Pattern::ALL {
            for kind in AllocatorKind::ALL {
                let trace = self.generate(kind, pattern);
                let path = self.output_path(kind, pattern);
                write_trace(&trace, &path)?;
                log::info!("-> {pattern}/{kind}: {} lines", trace.len());
                written.push(path);
            }
        }
        Ok(written)
    }

    /// Generate the size-class sweep trace for `config` and write it to
    /// `trace.alloc` in the output directory.
    pub fn run_sweep(&mut self, config: Config) -> Result<PathBuf, Error> {
        fs::create_dir_all(&self.output_dir).map_err(io_error("create", &self.output_dir))?;
        let mut trace = Trace::with_target(config, self.target);
        sweep::sweep(&mut trace, &mut self.chooser);
        let path = self.output_dir.join(SWEEP_FILE_NAME);
        write_trace(&trace, &path)?;
        log::info!("-> sweep/{}: {} lines", config.kind(), trace.len());
        Ok(path)
    }
}

fn write_trace(trace: &Trace, path: &Path) -> Result<(), Error> {
    let file = fs::File::create(path).map_err(io_error("create", path))?;
    let mut out = io::BufWriter::new(file);
    trace.write_to(&mut out).map_err(io_error("write", path))?;
    io::Write::flush(&mut out).map_err(io_error("write", path))
}
