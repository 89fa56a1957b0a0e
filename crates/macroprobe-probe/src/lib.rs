//! macroprobe Probe Engine
//!
//! Decides macro values by asking the compiler. Candidate macros are
//! rendered into probe units, compiled to LLVM IR with clang, and the
//! initializers of the generated globals are read back.
//!
//! ## Modules
//!
//! - `generator` - Probe unit rendering and diagnostic attribution
//! - `toolchain` - The [`Toolchain`] trait and the clang implementation
//! - `artifact` - LLVM IR global reading
//! - `extract` - Mapping globals to probe results
//! - `isolate` - Batch compilation with failure isolation
//! - `engine` - The end-to-end extractor
//! - `expand` - Macros reachable through a header's includes

pub mod artifact;
pub mod engine;
pub mod expand;
pub mod extract;
pub mod generator;
pub mod isolate;
pub mod toolchain;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{Aggregator, Extraction, MacroExtractor};
pub use expand::expanded_header;
pub use generator::{ProbeContext, ProbeGenerator, ProbeUnit};
pub use toolchain::{ClangToolchain, CompileOutput, Toolchain, ToolchainError};

use macroprobe_core::{Config, Result};
use macroprobe_parser::HeaderSource;

/// Extract with clang, configured from `config`
pub fn extract_with_clang(headers: &[HeaderSource], config: &Config) -> Result<Extraction> {
    config.validate()?;
    let toolchain = ClangToolchain::new(config.toolchain.clone())?;
    MacroExtractor::new(toolchain, config.probe.clone()).extract(headers)
}
