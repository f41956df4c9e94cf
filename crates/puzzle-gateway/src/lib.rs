//! Gateway-facing contracts for the puzzle edge composition engine.
//!
//! The upstream HTTP transport is an external collaborator; this crate
//! defines what the engine needs from it:
//! - `GatewayClient` - Content, placeholder, and static asset fetches
//! - `ContentRequest` - Upstream URL and query construction
//! - `ContentResponse` - Partial map, page model, propagated status/headers
//! - `TimeoutConfig` - Per-fragment fetch timeouts

mod client;
mod request;
mod response;
mod timeout;

pub use client::*;
pub use request::*;
pub use response::*;
pub use timeout::*;
