//! Include-expanded macro harvesting
//!
//! A header often gets most of its macros from the headers it includes.
//! Running `clang -E -dM` on it lists every macro visible at its end, which
//! is appended as a second source after the header's own text.

use macroprobe_parser::{HeaderScanner, HeaderSource};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::toolchain::{define_names, ClangToolchain, ToolchainError};

/// The header itself, followed by the macros its includes bring in.
///
/// Names the header defines itself and names in `predefined` (see
/// [`ClangToolchain::predefined_macro_names`]) are left out of the second
/// source, so the header's own definitions keep their locations.
pub fn expanded_header(
    toolchain: &ClangToolchain,
    path: &Path,
    predefined: &HashSet<String>,
) -> Result<Vec<HeaderSource>, ToolchainError> {
    let text = std::fs::read_to_string(path)?;
    let header = HeaderSource::new(path.to_string_lossy(), text);
    let dump = toolchain.dump_macros(path)?;

    let own: HashSet<String> = HeaderScanner::directives_only()
        .scan(&header)
        .macros
        .into_iter()
        .map(|m| m.name)
        .collect();

    let included = filter_dump(&dump, &own, predefined);
    debug!(
        "{}: {} macros visible through includes",
        header.id,
        define_names(&included).count()
    );

    let mut sources = vec![header];
    if !included.is_empty() {
        let id = format!("{} (included)", sources[0].id);
        sources.push(HeaderSource::new(id, included));
    }
    Ok(sources)
}

/// `#define` lines of a `-dM` dump whose names are in neither set
fn filter_dump(dump: &str, own: &HashSet<String>, predefined: &HashSet<String>) -> String {
    let mut kept = String::new();
    for line in dump.lines() {
        let Some(name) = define_names(line).next() else {
            continue;
        };
        if own.contains(&name) || predefined.contains(&name) {
            continue;
        }
        kept.push_str(line);
        kept.push('\n');
    }
    kept
}
