//! Header Scanner
//!
//! Turns header text into logical lines (continuations joined, comments
//! stripped) and extracts `#define` and `#include` directives from them.
//! No conditional evaluation happens here: every definition is recorded in
//! encounter order, whichever `#if` branch it sits in.

use macroprobe_core::{Location, MacroDefinition};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::declarations::DeclarationCollector;
use crate::lexer::is_identifier;
use crate::{HeaderSource, ScannedHeader};

static DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#\s*([A-Za-z_]\w*)(.*)$").expect("directive pattern"));

static INCLUDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*(?:<([^>]+)>|"([^"]+)")"#).expect("include pattern"));

/// Reasons a directive is skipped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("#define without a macro name")]
    MissingName,

    #[error("unterminated parameter list for macro '{0}'")]
    UnterminatedParameters(String),

    #[error("invalid parameter '{param}' for macro '{name}'")]
    InvalidParameter { name: String, param: String },
}

/// A skipped directive, reported without aborting the scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDiagnostic {
    pub location: Location,
    pub error: ScanError,
    /// The offending logical line
    pub text: String,
}

impl std::fmt::Display for ScanDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.error)
    }
}

/// An `#include` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub path: String,
    /// `<...>` form
    pub system: bool,
    pub location: Location,
}

impl IncludeDirective {
    pub fn to_directive(&self) -> String {
        if self.system {
            format!("#include <{}>", self.path)
        } else {
            format!("#include \"{}\"", self.path)
        }
    }
}

/// One logical source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// First physical line (1-based)
    pub line: u32,
    pub text: String,
}

/// Join continuation lines, then strip comments
pub fn logical_lines(source: &str) -> Vec<LogicalLine> {
    strip_comments(splice_continuations(source))
}

fn splice_continuations(source: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut current: Option<LogicalLine> = None;

    for (idx, raw) in source.lines().enumerate() {
        let (content, continued) = match raw.trim_end().strip_suffix('\\') {
            Some(content) => (content, true),
            None => (raw, false),
        };

        match current.as_mut() {
            Some(line) => line.text.push_str(content),
            None => {
                current = Some(LogicalLine {
                    line: idx as u32 + 1,
                    text: content.to_string(),
                })
            }
        }

        if !continued {
            if let Some(done) = current.take() {
                lines.push(done);
            }
        }
    }

    // A trailing backslash on the last line
    if let Some(done) = current.take() {
        lines.push(done);
    }

    lines
}

fn strip_comments(lines: Vec<LogicalLine>) -> Vec<LogicalLine> {
    let mut in_block = false;

    lines
        .into_iter()
        .map(|line| {
            let chars: Vec<char> = line.text.chars().collect();
            let mut out = String::with_capacity(line.text.len());
            let mut quote: Option<char> = None;
            let mut i = 0;

            while i < chars.len() {
                let c = chars[i];
                let next = chars.get(i + 1).copied();

                if in_block {
                    if c == '*' && next == Some('/') {
                        in_block = false;
                        i += 2;
                    } else {
                        i += 1;
                    }
                    continue;
                }

                if let Some(q) = quote {
                    out.push(c);
                    if c == '\\' {
                        if let Some(n) = next {
                            out.push(n);
                        }
                        i += 2;
                        continue;
                    }
                    if c == q {
                        quote = None;
                    }
                    i += 1;
                    continue;
                }

                match (c, next) {
                    ('"', _) | ('\'', _) => {
                        quote = Some(c);
                        out.push(c);
                        i += 1;
                    }
                    ('/', Some('/')) => break,
                    ('/', Some('*')) => {
                        in_block = true;
                        out.push(' ');
                        i += 2;
                    }
                    _ => {
                        out.push(c);
                        i += 1;
                    }
                }
            }

            LogicalLine {
                line: line.line,
                text: out,
            }
        })
        .collect()
}

/// Parse the text following `#define`
pub fn parse_define(rest: &str, location: Location) -> Result<MacroDefinition, ScanError> {
    let rest = rest.trim_start();
    let name_len = rest
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    let name = &rest[..name_len];

    if !is_identifier(name) {
        return Err(ScanError::MissingName);
    }

    let after = &rest[name_len..];

    // `NAME(` with no whitespace is the only function-like form
    if let Some(params_and_body) = after.strip_prefix('(') {
        let close = params_and_body
            .find(')')
            .ok_or_else(|| ScanError::UnterminatedParameters(name.to_string()))?;

        let mut parameters = Vec::new();
        for param in params_and_body[..close].split(',').map(str::trim) {
            if param.is_empty() {
                continue;
            }
            let valid = param == "..."
                || is_identifier(param)
                || param.strip_suffix("...").is_some_and(is_identifier);
            if !valid {
                return Err(ScanError::InvalidParameter {
                    name: name.to_string(),
                    param: param.to_string(),
                });
            }
            parameters.push(param.to_string());
        }

        let body = params_and_body[close + 1..].trim();
        return Ok(MacroDefinition::function_like(name, parameters, body, location));
    }

    Ok(MacroDefinition::object_like(name, after.trim(), location))
}

/// Parse the text following `#include`; computed includes yield `None`
pub fn parse_include(rest: &str, location: Location) -> Option<IncludeDirective> {
    let caps = INCLUDE_RE.captures(rest)?;
    if let Some(system) = caps.get(1) {
        return Some(IncludeDirective {
            path: system.as_str().to_string(),
            system: true,
            location,
        });
    }
    caps.get(2).map(|local| IncludeDirective {
        path: local.as_str().to_string(),
        system: false,
        location,
    })
}

/// Scans header sources into macro definitions, includes and declarations
pub struct HeaderScanner {
    declarations: Option<DeclarationCollector>,
}

impl HeaderScanner {
    /// Create a scanner. Declaration harvesting is disabled (with a
    /// warning) if the C grammar cannot be loaded.
    pub fn new() -> Self {
        let declarations = match DeclarationCollector::new() {
            Ok(collector) => Some(collector),
            Err(e) => {
                warn!("Declaration harvesting disabled: {}", e);
                None
            }
        };
        Self { declarations }
    }

    /// Scanner that only looks at directives
    pub fn directives_only() -> Self {
        Self { declarations: None }
    }

    /// Scan one header
    pub fn scan(&mut self, header: &HeaderSource) -> ScannedHeader {
        let mut scanned = ScannedHeader {
            file: header.id.clone(),
            ..ScannedHeader::default()
        };

        for line in logical_lines(&header.text) {
            let Some(caps) = DIRECTIVE_RE.captures(&line.text) else {
                continue;
            };
            let directive = caps.get(1).map_or("", |m| m.as_str());
            let rest = caps.get(2).map_or("", |m| m.as_str());
            let location = Location::new(&header.id, line.line);

            match directive {
                "define" => match parse_define(rest, location.clone()) {
                    Ok(definition) => scanned.macros.push(definition),
                    Err(error) => {
                        warn!("{}: skipping malformed #define: {}", location, error);
                        scanned.diagnostics.push(ScanDiagnostic {
                            location,
                            error,
                            text: line.text.trim().to_string(),
                        });
                    }
                },
                "include" => {
                    if let Some(include) = parse_include(rest, location) {
                        scanned.includes.push(include);
                    }
                }
                _ => {}
            }
        }

        if let Some(collector) = self.declarations.as_mut() {
            scanned.declarations = collector.collect(&header.text, &header.id);
        }

        debug!(
            "Scanned {}: {} macros, {} includes, {} declarations",
            header.id,
            scanned.macros.len(),
            scanned.includes.len(),
            scanned.declarations.len()
        );

        scanned
    }
}

impl Default for HeaderScanner {
    fn default() -> Self {
        Self::new()
    }
}
