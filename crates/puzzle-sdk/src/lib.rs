//! Public SDK for the puzzle edge composition engine.
//!
//! This crate re-exports the whole platform:
//!
//! ```ignore
//! use puzzle_sdk::prelude::*;
//!
//! let compiler = TemplateCompiler::new(&client, PageOptions::new("storefront"));
//! let plan = compiler.compile(source, &gateways, &mut routes).await?;
//! let mut page = Page::new(plan, Box::new(NoopHooks));
//!
//! let mut sink = StreamingSink::new(writer, TimingContext::new());
//! page.handle(&req, &client, &mut sink).await?;
//! ```

pub use puzzle_compiler;
pub use puzzle_core;
pub use puzzle_gateway;
pub use puzzle_observability;
pub use puzzle_streaming;

/// Prelude for convenient imports.
pub mod prelude {
    pub use puzzle_compiler::*;
    pub use puzzle_core::*;
    pub use puzzle_gateway::*;
    pub use puzzle_observability::*;
    pub use puzzle_streaming::*;
}
