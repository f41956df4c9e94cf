//! Compile-time error types.

use thiserror::Error;

/// Errors that abort template compilation.
///
/// Request-time failures never surface here; they degrade to safe textual
/// substitutes instead.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The page source has no `<template>…</template>` region.
    #[error("no <template> region found in page source")]
    TemplateNotFound,

    /// Two different fragment names both claim to be primary.
    #[error("multiple primary fragments: '{first}' and '{second}'")]
    MultiplePrimaryFragments { first: String, second: String },

    /// A fragment tag is missing a required attribute.
    #[error("fragment tag #{index} is missing required attribute '{attribute}'")]
    MissingFragmentAttribute {
        index: usize,
        attribute: &'static str,
    },
}
