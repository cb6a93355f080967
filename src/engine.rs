//! Interface to the external repair engine
//!
//! The engine that actually performs erasure-coded recovery is an external
//! collaborator: it is handed a fixed parameter set, streams human-readable
//! text into the supplied sinks, and reports one native result code. This
//! module pins down that contract as the [`RepairEngine`] trait so the
//! orchestrator never depends on a concrete engine.
//!
//! A binding to a native libpar2 build would implement this trait and is the
//! one place `unsafe extern` code belongs; in-process test doubles implement
//! it just as easily.

use std::io;
use std::path::{Path, PathBuf};

/// Native result codes of the repair engine
///
/// The values mirror the engine's C ABI and are mapped onto
/// [`RepairOutcome`](crate::RepairOutcome) by the orchestrator. Codes outside
/// this set are treated as an internal inconsistency, never passed through.
pub mod code {
    /// All files verified intact, or repair completed successfully
    pub const SUCCESS: i32 = 0;
    /// Damage was found and the available recovery data can fix it
    pub const REPAIR_POSSIBLE: i32 = 1;
    /// Damage was found and exceeds the available recovery data
    pub const REPAIR_NOT_POSSIBLE: i32 = 2;
    /// The engine rejected its parameters
    pub const INVALID_ARGUMENTS: i32 = 3;
    /// Critical packets are missing from the recovery set
    pub const INSUFFICIENT_DATA: i32 = 4;
    /// A repair was attempted and did not complete
    pub const REPAIR_FAILED: i32 = 5;
    /// A file could not be read or written
    pub const FILE_IO_ERROR: i32 = 6;
    /// The engine detected an internal inconsistency
    pub const LOGIC_ERROR: i32 = 7;
    /// The engine ran out of memory
    pub const MEMORY_ERROR: i32 = 8;
}

/// Output volume requested from the engine
///
/// Progress percentages are only emitted at [`Verbosity::Normal`]; `Silent`
/// suppresses all output text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Suppress all output, including progress text
    Silent,
    /// Emit regular output with progress percentages
    Normal,
}

/// Parameter set for one engine invocation
///
/// Assembled by the orchestrator from resource budgeting, file discovery, and
/// the caller's flags. Borrows everything; nothing outlives the call.
#[derive(Debug)]
pub struct RepairParams<'a> {
    /// Output volume; progress text is only produced at `Normal`
    pub verbosity: Verbosity,
    /// Memory ceiling in bytes; the budget floor guarantees this is nonzero
    pub memory_limit_bytes: u64,
    /// Directory holding the recovery set and its target files
    pub base_path: &'a Path,
    /// Worker thread count for block computation
    pub threads: u32,
    /// Thread count for concurrent file I/O
    pub file_threads: u32,
    /// The recovery-set file driving the run
    pub par2_file: &'a Path,
    /// Additional files offered for content-hash identification
    pub extra_files: &'a [PathBuf],
    /// Perform repair when true, verify only when false
    pub do_repair: bool,
    /// Delete recovery files after a successful repair
    pub purge_files: bool,
    /// Skip leading/trailing data when scanning damaged files
    pub skip_data: bool,
    /// Tolerated offset in bytes when skipping data
    pub skip_leeway: u64,
}

/// The external repair engine, modeled as an injected capability
///
/// One synchronous method: the engine runs to completion on the calling
/// thread, writing progress and log text into `stdout` and diagnostics into
/// `stderr` as the run proceeds.
///
/// # Examples
///
/// ```
/// use par2_driver::{RepairEngine, RepairParams, engine::code};
/// use std::io::Write;
///
/// /// An engine that reports every recovery set as intact.
/// struct AlwaysIntact;
///
/// impl RepairEngine for AlwaysIntact {
///     fn run(
///         &self,
///         _params: &RepairParams<'_>,
///         stdout: &mut dyn Write,
///         _stderr: &mut dyn Write,
///     ) -> i32 {
///         let _ = writeln!(stdout, "All files are correct, repair is not needed.");
///         code::SUCCESS
///     }
/// }
/// ```
pub trait RepairEngine {
    /// Run one verification/repair pass synchronously
    ///
    /// Returns the engine's native result code (see [`code`]). Sink write
    /// failures are the engine's to swallow; the orchestrator's sinks never
    /// fail.
    fn run(
        &self,
        params: &RepairParams<'_>,
        stdout: &mut dyn io::Write,
        stderr: &mut dyn io::Write,
    ) -> i32;
}
