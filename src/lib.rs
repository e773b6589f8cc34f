pub mod config;
pub mod diagnostics;
pub mod directory;
pub mod engine;
pub mod error;
pub mod normalization;
pub mod response;
pub mod session;
pub mod setup;

pub use config::Config;
pub use diagnostics::{DiagnosticsCollector, ScreeningEvent, ScreeningStats};
pub use directory::{Contact, ContactDirectory, FileDirectory, InMemoryDirectory};
pub use engine::{decide, DecisionReason, EngineConfig, ScreeningDecision, ScreeningEngine};
pub use error::{DirectoryError, ScreeningError};
pub use normalization::{normalize, NormalizedNumber};
pub use response::{build_response, Disposition, ScreeningResponse};
pub use session::{CallEvent, CallResponder, LoggingResponder, ScreeningOutcome, ScreeningSession};
pub use setup::{Permission, ProtectionState, SetupStatus};
