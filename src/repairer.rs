//! Synchronous repair orchestration
//!
//! [`Par2Repairer`] is the single entry point: it composes discovery,
//! budgeting, and progress extraction around one synchronous run of the
//! injected [`RepairEngine`] and maps the engine's native result code onto
//! the closed [`RepairOutcome`] taxonomy. One call is one full traversal —
//! nothing persists between invocations and there is no resumability.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::budget::{HostInfo, ResourceBudget, SystemHost};
use crate::discovery;
use crate::engine::{RepairEngine, RepairParams, Verbosity, code};
use crate::error::{Error, Result};
use crate::progress::{MessageCallback, ProgressCallback, ProgressExtractor};

/// Thread count for the engine's concurrent file I/O, independent of the
/// computation thread budget
const FILE_THREADS: u32 = 2;

/// Outcome of one repair invocation
///
/// The closed taxonomy every engine run is mapped onto. Exactly one outcome
/// is produced per invocation; progress events are the only other externally
/// visible effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairOutcome {
    /// All files verified intact, or repair completed successfully
    Success,
    /// Verification found damage that the available recovery data can fix
    RepairPossible,
    /// Damage exceeds what the available recovery data can fix
    RepairNotPossible,
    /// The target file reference or engine parameters were rejected
    InvalidArguments,
    /// Critical packets are missing from the recovery set
    InsufficientData,
    /// A repair was attempted and did not complete
    RepairFailed,
    /// A file could not be read or written
    FileIOError,
    /// An internal inconsistency was detected
    LogicError,
    /// The engine ran out of memory
    MemoryError,
}

impl RepairOutcome {
    /// Map a native engine result code onto the closed outcome taxonomy
    ///
    /// The mapping is total: any code outside the known set maps to
    /// [`RepairOutcome::LogicError`], signaling an internal inconsistency
    /// rather than misreporting a benign outcome.
    pub fn from_code(native: i32) -> Self {
        match native {
            code::SUCCESS => Self::Success,
            code::REPAIR_POSSIBLE => Self::RepairPossible,
            code::REPAIR_NOT_POSSIBLE => Self::RepairNotPossible,
            code::INVALID_ARGUMENTS => Self::InvalidArguments,
            code::INSUFFICIENT_DATA => Self::InsufficientData,
            code::REPAIR_FAILED => Self::RepairFailed,
            code::FILE_IO_ERROR => Self::FileIOError,
            code::LOGIC_ERROR => Self::LogicError,
            code::MEMORY_ERROR => Self::MemoryError,
            _ => Self::LogicError,
        }
    }

    /// True for [`RepairOutcome::Success`]
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Convert the outcome into a `Result`, honoring the run mode
    ///
    /// [`RepairOutcome::RepairPossible`] is success for a verify-only run —
    /// the files can be fixed if the caller chooses to — and an error for a
    /// repair run, where it means the engine stopped before repairing.
    ///
    /// # Errors
    ///
    /// Every outcome other than `Success` (and `RepairPossible` when
    /// verifying) becomes an [`Error::Repair`] with a descriptive reason.
    pub fn into_result(self, do_repair: bool) -> Result<()> {
        let reason = match self {
            Self::Success => return Ok(()),
            Self::RepairPossible if !do_repair => return Ok(()),
            Self::RepairPossible => "repair is possible but was not performed",
            Self::RepairNotPossible => "insufficient recovery data to repair",
            Self::InvalidArguments => "invalid arguments",
            Self::InsufficientData => "recovery set is missing critical packets",
            Self::RepairFailed => "repair was attempted and failed",
            Self::FileIOError => "file could not be read or written",
            Self::LogicError => "internal inconsistency in the repair engine",
            Self::MemoryError => "repair engine ran out of memory",
        };
        Err(Error::Repair {
            outcome: self,
            reason: reason.to_string(),
        })
    }
}

/// Drives the external repair engine for one recovery set
///
/// One instance wraps one recovery-set file and one engine. Each `repair*`
/// call performs the full sequence — candidate discovery, resource budgeting,
/// sink selection, synchronous engine run, outcome mapping — and blocks the
/// calling thread until the engine finishes. There is no cancellation; use
/// [`Par2Repairer::spawn_repair`] when the result may need to be abandoned.
///
/// # Examples
///
/// ```no_run
/// use par2_driver::{Par2Repairer, ProgressCallback, RepairEngine, RepairParams};
/// use std::io::Write;
/// use std::sync::Arc;
///
/// struct NativeEngine; // binding to a native libpar2 build
///
/// impl RepairEngine for NativeEngine {
///     fn run(
///         &self,
///         params: &RepairParams<'_>,
///         stdout: &mut dyn Write,
///         stderr: &mut dyn Write,
///     ) -> i32 {
///         // hand params to the native engine, streaming its output into the sinks
///         0
///     }
/// }
///
/// let on_progress: ProgressCallback = Arc::new(|phase, current, total| {
///     println!("{phase:?}: {current}/{total}");
/// });
///
/// let repairer = Par2Repairer::new("/downloads/archive.par2", NativeEngine);
/// let outcome = repairer.repair_with_progress(true, false, Some(on_progress));
/// assert!(outcome.is_success());
/// ```
pub struct Par2Repairer<E> {
    par2_file: PathBuf,
    engine: E,
    host: Box<dyn HostInfo + Send + Sync>,
}

impl<E> std::fmt::Debug for Par2Repairer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Par2Repairer")
            .field("par2_file", &self.par2_file)
            .finish_non_exhaustive()
    }
}

impl<E: RepairEngine> Par2Repairer<E> {
    /// Create a repairer for the given recovery-set file
    pub fn new(par2_file: impl Into<PathBuf>, engine: E) -> Self {
        Self {
            par2_file: par2_file.into(),
            engine,
            host: Box::new(SystemHost),
        }
    }

    /// Create a repairer by locating the recovery-set index file in `dir`
    ///
    /// Scans the directory for `.par2` files and picks the index file (or the
    /// smallest volume when no index is present) to drive the run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecoverySet`] when the directory holds no recovery
    /// files, or [`Error::Io`] when it cannot be listed.
    pub fn discover(dir: impl AsRef<Path>, engine: E) -> Result<Self> {
        let dir = dir.as_ref();
        let files = discovery::find_recovery_files(dir)?;
        let index = discovery::select_recovery_index(&files).ok_or_else(|| {
            Error::NoRecoverySet {
                dir: dir.to_path_buf(),
            }
        })?;
        debug!(par2_file = %index.display(), "discovered recovery set");
        Ok(Self::new(index.clone(), engine))
    }

    /// Replace the host-capacity source
    ///
    /// Budgets are derived from `host` instead of the operating system;
    /// intended for tests and embedders with their own capacity policies.
    #[must_use]
    pub fn with_host(mut self, host: impl HostInfo + Send + Sync + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    /// The recovery-set file driving this repairer
    pub fn par2_file(&self) -> &Path {
        &self.par2_file
    }

    /// Verify or repair without progress reporting
    ///
    /// Behaves exactly like [`Par2Repairer::repair_with_progress`] with no
    /// callback and purging disabled.
    pub fn repair(&self, do_repair: bool) -> RepairOutcome {
        self.repair_with_callbacks(do_repair, false, None, None)
    }

    /// Verify or repair with optional progress reporting
    ///
    /// When `progress` is supplied the engine runs at normal verbosity with a
    /// [`ProgressExtractor`] attached to its output; otherwise it runs silent
    /// with a discarding sink. `purge_files` asks the engine to delete the
    /// recovery files after a successful repair.
    pub fn repair_with_progress(
        &self,
        do_repair: bool,
        purge_files: bool,
        progress: Option<ProgressCallback>,
    ) -> RepairOutcome {
        self.repair_with_callbacks(do_repair, purge_files, progress, None)
    }

    /// Verify or repair with optional progress and message callbacks
    ///
    /// The full form: `messages` additionally receives the engine's
    /// non-progress output lines, classified by severity. Blocks the calling
    /// thread for the engine's entire run. Both callbacks are invoked
    /// synchronously on whatever thread the engine writes from; they must
    /// return promptly and must not block, or they will stall the engine.
    pub fn repair_with_callbacks(
        &self,
        do_repair: bool,
        purge_files: bool,
        progress: Option<ProgressCallback>,
        messages: Option<MessageCallback>,
    ) -> RepairOutcome {
        if self.par2_file.as_os_str().is_empty() {
            return RepairOutcome::InvalidArguments;
        }

        let base_path = discovery::base_directory(&self.par2_file);
        let extra_files = discovery::collect_candidate_files(&base_path);
        let budget = ResourceBudget::detect(self.host.as_ref());

        // The engine suppresses progress text entirely when silent, so any
        // attached callback forces normal verbosity.
        let verbosity = if progress.is_some() || messages.is_some() {
            Verbosity::Normal
        } else {
            Verbosity::Silent
        };

        let params = RepairParams {
            verbosity,
            memory_limit_bytes: budget.memory_limit_bytes,
            base_path: &base_path,
            threads: budget.thread_count,
            file_threads: FILE_THREADS,
            par2_file: &self.par2_file,
            extra_files: &extra_files,
            do_repair,
            purge_files,
            skip_data: false,
            skip_leeway: 0,
        };

        debug!(
            par2_file = %self.par2_file.display(),
            extra_files = extra_files.len(),
            memory_limit_bytes = budget.memory_limit_bytes,
            threads = budget.thread_count,
            do_repair,
            purge_files,
            "invoking repair engine"
        );

        let mut stdout = ProgressExtractor::with_messages(progress, messages);
        let mut stderr = io::sink();
        let native = self.engine.run(&params, &mut stdout, &mut stderr);

        let outcome = RepairOutcome::from_code(native);
        info!(native, ?outcome, "repair engine finished");
        outcome
    }
}

impl<E: RepairEngine + Send + 'static> Par2Repairer<E> {
    /// Run the repair on tokio's blocking pool, consuming the repairer
    ///
    /// The synchronous entry points block for the engine's full run and
    /// cannot be cancelled. Driving the run from a dedicated blocking task
    /// lets callers await the outcome or abandon the handle and discard it.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn_repair(
        self,
        do_repair: bool,
        purge_files: bool,
        progress: Option<ProgressCallback>,
    ) -> tokio::task::JoinHandle<RepairOutcome> {
        tokio::task::spawn_blocking(move || {
            self.repair_with_progress(do_repair, purge_files, progress)
        })
    }
}
