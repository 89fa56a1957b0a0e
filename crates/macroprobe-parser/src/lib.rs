//! macroprobe Parser
//!
//! Lexical front half of the extraction pipeline: everything that can be
//! decided from header text alone, without invoking a compiler.
//!
//! ## Modules
//!
//! - `lexer` - Token splitting for replacement lists and declarations
//! - `scanner` - `#define` / `#include` extraction from logical lines
//! - `declarations` - Top-level declarations via tree-sitter
//! - `classify` - Pre-probe macro categorization
//! - `parallel` - Scanning many headers with rayon

pub mod classify;
pub mod declarations;
pub mod lexer;
pub mod parallel;
pub mod scanner;

pub use classify::Classifier;
pub use parallel::scan_headers;
pub use scanner::{HeaderScanner, IncludeDirective, ScanDiagnostic, ScanError};

use macroprobe_core::{Declaration, MacroDefinition, Result};
use std::path::Path;

/// A header's text together with the identifier used in diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSource {
    /// File identifier (usually the path as given by the caller)
    pub id: String,
    pub text: String,
}

impl HeaderSource {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Read a header from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path.to_string_lossy(), text))
    }
}

/// Everything the scanner found in one header
#[derive(Debug, Clone, Default)]
pub struct ScannedHeader {
    pub file: String,
    /// Definitions in encounter order, duplicates kept
    pub macros: Vec<MacroDefinition>,
    pub includes: Vec<IncludeDirective>,
    pub declarations: Vec<Declaration>,
    /// Skipped malformed directives
    pub diagnostics: Vec<ScanDiagnostic>,
}

/// Scan a single header
pub fn scan_header(header: &HeaderSource) -> ScannedHeader {
    HeaderScanner::new().scan(header)
}
