//! Observability for the puzzle edge composition engine.
//!
//! Structured logging with request correlation. Compile-time planning and
//! request-time streaming both log through `StructuredLogger`; recoverable
//! failures (asset fetches, placeholder fetches, unknown inject types) are
//! reported here rather than aborting the response.

mod logging;

pub use logging::*;
