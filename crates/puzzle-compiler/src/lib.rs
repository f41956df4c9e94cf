//! Template compilation and planning for the puzzle edge composition engine.
//!
//! A page template declares `<fragment>` placeholders. At compile time this
//! crate parses the template, classifies every fragment occurrence, rewrites
//! the DOM into sentinel tokens and containers, plans asset injection, and
//! produces a `PagePlan` the streaming request handler drives at request
//! time:
//! - `TemplateCompiler` - The compiler/planner entry point
//! - `DomView` - HTML parse + serialization facade
//! - `FragmentRegistry` - Owned fragment descriptors per template
//! - `AssetPlanner` / `DependencyInjector` / `StylesheetBundler` - Asset
//!   injection planning
//! - `CompiledShell` - The precompiled first-flush shell

mod assets;
mod compiler;
mod dependencies;
mod dom;
mod error;
mod fragment;
pub mod markup;
mod replace;
mod shell;
mod stylesheet;

pub use assets::*;
pub use compiler::*;
pub use dependencies::*;
pub use dom::*;
pub use error::*;
pub use fragment::*;
pub use markup::*;
pub use replace::*;
pub use shell::*;
pub use stylesheet::*;
