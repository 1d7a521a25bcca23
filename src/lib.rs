//! Screening Flow - stage sequencing and local results ledger for a child
//! development screening
//!
//! A screening is a parent questionnaire followed by short activities
//! (response to name, imitation, blowing out candles, shape matching, a
//! pointing adventure). Each activity yields pass/fail; results are merged
//! into a single locally stored Session Record and shown as a summary.
//!
//! ## Modules
//!
//! - **Flow**: `ScreeningFlow` drives one live stage at a time and records results
//! - **Detection**: pure, frame-by-frame detectors behind an activation gate
//! - **Summary**: pass/fail view and clean export of the stored record

pub mod activity;
pub mod config;
pub mod detection;
pub mod error;
pub mod flow;
pub mod games;
pub mod recorder;
pub mod sequencer;
pub mod session;
pub mod store;
pub mod summary;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::FlowConfig;
pub use error::FlowError;
pub use flow::{FlowMode, FlowStatus, NoopHost, ScreeningFlow, StageHost, StageView};
pub use games::{Phase, StageInput};
pub use recorder::{ActivityRecorder, RecordOutcome};
pub use sequencer::{Stage, StageSequencer};
pub use session::{QuestionnaireForm, SessionContext};
pub use store::{FileStore, MemoryStore, SessionStore, DEFAULT_STORAGE_KEY};
pub use summary::{CleanExport, Summary};
pub use types::{ActivityResult, Answer, QuestionId, SessionRecord, Verdict};

/// Crate version, reported by the CLI and the C ABI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
