//! Observability primitives for memoria's retrieval core.
//!
//! Provides structured JSON/pretty logging setup and domain-event logging with a
//! consistent schema, shared by every module of the retrieval core.

pub mod domain_events;
pub mod init;
pub mod macros;

pub use domain_events::*;
pub use init::*;

// Re-export tracing for convenience
pub use tracing::{debug, error, info, warn, trace, span, Level, Instrument};
pub use tracing::instrument;
