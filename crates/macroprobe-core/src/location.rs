//! Source locations of macro definitions and declarations

use serde::{Deserialize, Serialize};

/// A position in a scanned header
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File identifier as supplied by the caller
    pub file: String,
    /// Line of the first physical line of the definition (1-based)
    pub line: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let loc = Location::new("include/flags.h", 12);
        assert_eq!(loc.to_string(), "include/flags.h:12");
    }
}
