//! # par2-driver
//!
//! Adaptive orchestration layer for PAR2-style repair engines.
//!
//! The engine that performs the actual erasure-coded recovery is an external
//! collaborator, injected behind the [`RepairEngine`] trait. This crate owns
//! everything around it: turning the engine's human-readable output into
//! structured progress events as the bytes arrive, budgeting memory and
//! threads from host capacity, assembling the extra-file candidate set that
//! lets the engine identify misnamed downloads by content hash, and mapping
//! the engine's native result codes onto a closed outcome taxonomy.
//!
//! ## Design Philosophy
//!
//! - **Engine-agnostic** - any implementation of one synchronous trait method
//! - **Best-effort environment queries** - detection failures degrade to
//!   documented fallbacks, never to errors
//! - **Push-based progress** - a streaming parser that composes with any
//!   byte-producing transport, fed as the engine writes
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use par2_driver::{Par2Repairer, ProgressCallback, RepairEngine, RepairParams};
//! use std::io::Write;
//! use std::sync::Arc;
//!
//! struct NativeEngine; // binding to a native libpar2 build
//!
//! impl RepairEngine for NativeEngine {
//!     fn run(
//!         &self,
//!         params: &RepairParams<'_>,
//!         stdout: &mut dyn Write,
//!         stderr: &mut dyn Write,
//!     ) -> i32 {
//!         // hand params to the native engine, streaming its output into the sinks
//!         0
//!     }
//! }
//!
//! let on_progress: ProgressCallback = Arc::new(|phase, current, total| {
//!     println!("{phase:?}: {current}/{total}");
//! });
//!
//! let repairer = Par2Repairer::new("/downloads/archive.par2", NativeEngine);
//! let outcome = repairer.repair_with_progress(
//!     true,  // repair, not just verify
//!     false, // keep recovery files afterward
//!     Some(on_progress),
//! );
//! println!("finished: {outcome:?}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Resource budgeting from host capacity
pub mod budget;
/// Candidate-file discovery
pub mod discovery;
/// Repair engine interface
pub mod engine;
/// Error types
pub mod error;
/// Streaming progress extraction
pub mod progress;
/// Repair orchestration
pub mod repairer;

// Re-export commonly used types
pub use budget::{HostInfo, ResourceBudget, SystemHost};
pub use engine::{RepairEngine, RepairParams, Verbosity};
pub use error::{Error, Result};
pub use progress::{
    MessageCallback, MessageLevel, PROGRESS_SCALE, Phase, ProgressCallback, ProgressEvent,
    ProgressExtractor,
};
pub use repairer::{Par2Repairer, RepairOutcome};
