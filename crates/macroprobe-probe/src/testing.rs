//! Scripted toolchain for unit tests

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use macroprobe_parser::lexer::identifiers;

use crate::generator::{flag_symbol, value_symbol, ProbeUnit, UNIT_FILE_NAME};
use crate::toolchain::{CompileOutput, Toolchain, ToolchainError};

/// What the fake compiler reports for a macro
#[derive(Debug, Clone, Copy)]
pub enum FakeValue {
    Constant(i64),
    NonConstant,
    Address,
}

/// A preamble line the fake compiler refuses, and the name it would provide
#[derive(Debug, Clone)]
struct RejectedLine {
    prefix: String,
    provides: String,
    message: String,
}

/// Answers compiles from a script instead of running a compiler. Macros
/// without a scripted value compile to the constant 0.
#[derive(Debug, Default)]
pub struct FakeToolchain {
    values: HashMap<String, FakeValue>,
    broken: HashSet<String>,
    rejected: Vec<RejectedLine>,
    missing_include: Option<String>,
    unlocated: bool,
    timeout: bool,
    unavailable: bool,
    compiles: AtomicUsize,
    compiled: Mutex<Vec<String>>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, name: &str, value: FakeValue) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    /// Fragments of `name` fail to compile
    pub fn broken(mut self, name: &str) -> Self {
        self.broken.insert(name.to_string());
        self
    }

    /// Any unit line starting with `prefix` is an error. Once the line is
    /// gone, fragments whose definitions use `provides` fail as undeclared.
    pub fn rejecting(mut self, prefix: &str, provides: &str, message: &str) -> Self {
        self.rejected.push(RejectedLine {
            prefix: prefix.to_string(),
            provides: provides.to_string(),
            message: message.to_string(),
        });
        self
    }

    /// Report errors without file/line, forcing bisection
    pub fn without_locations(mut self) -> Self {
        self.unlocated = true;
        self
    }

    /// Fail any unit that includes `header`
    pub fn missing_include(mut self, header: &str) -> Self {
        self.missing_include = Some(header.to_string());
        self
    }

    pub fn timing_out(mut self) -> Self {
        self.timeout = true;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    /// Every macro name that appeared in a compiled unit
    pub fn compiled_names(&self) -> Vec<String> {
        self.compiled.lock().map(|names| names.clone()).unwrap_or_default()
    }
}

/// Replacement list of `#define NAME ...` in the unit, if it is defined
fn definition_body<'s>(lines: &[&'s str], name: &str) -> Option<&'s str> {
    let directive = format!("#define {}", name);
    lines.iter().find_map(|line| {
        let rest = line.strip_prefix(&directive)?;
        (rest.is_empty() || rest.starts_with(' ') || rest.starts_with('(')).then_some(rest)
    })
}

impl Toolchain for FakeToolchain {
    fn compile(&self, unit: &ProbeUnit) -> Result<CompileOutput, ToolchainError> {
        if self.unavailable {
            return Err(ToolchainError::Spawn {
                path: PathBuf::from("fake-cc"),
                source: io::Error::new(io::ErrorKind::NotFound, "not installed"),
            });
        }
        self.compiles.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut names) = self.compiled.lock() {
            names.extend(unit.macro_names().map(str::to_string));
        }

        if self.timeout {
            return Ok(CompileOutput::TimedOut(Duration::from_secs(1)));
        }

        if let Some(header) = &self.missing_include {
            let directive = format!("#include {}", header);
            if let Some(index) = unit.source.lines().position(|l| l == directive) {
                return Ok(CompileOutput::Diagnostics(format!(
                    "/tmp/probe/{}:{}:10: fatal error: '{}' file not found\n1 error generated.\n",
                    UNIT_FILE_NAME,
                    index + 1,
                    header.trim_matches(|c| c == '<' || c == '>')
                )));
            }
        }

        let lines: Vec<&str> = unit.source.lines().collect();
        let mut text = String::new();

        for (index, line) in lines.iter().enumerate() {
            if let Some(rejected) = self.rejected.iter().find(|r| line.starts_with(&r.prefix)) {
                text.push_str(&format!(
                    "/tmp/probe/{}:{}:1: error: {}\n",
                    UNIT_FILE_NAME,
                    index + 1,
                    rejected.message
                ));
            }
        }

        for span in &unit.fragments {
            let name = span.macro_name.as_str();
            let location = if self.unlocated {
                "error:".to_string()
            } else {
                format!("/tmp/probe/{}:{}:5: error:", UNIT_FILE_NAME, span.last_line - 1)
            };

            if self.broken.contains(name) {
                text.push_str(&format!("{} expected expression\n", location));
                continue;
            }
            match definition_body(&lines, name) {
                None => text.push_str(&format!("{} use of undeclared identifier '{}'\n", location, name)),
                Some(body) => {
                    let missing = identifiers(body).into_iter().find(|ident| {
                        self.rejected.iter().any(|r| {
                            &r.provides == ident && !lines.iter().any(|l| l.starts_with(&r.prefix))
                        })
                    });
                    if let Some(ident) = missing {
                        text.push_str(&format!("{} use of undeclared identifier '{}'\n", location, ident));
                    }
                }
            }
        }

        if !text.is_empty() {
            text.push_str("errors generated.\n");
            return Ok(CompileOutput::Diagnostics(text));
        }

        let sentinel = macroprobe_core::config::DEFAULT_SENTINEL;
        let mut ir = format!("; ModuleID = '{}'\n", UNIT_FILE_NAME);
        for span in &unit.fragments {
            let name = span.macro_name.as_str();
            let (flag, value) = match self.values.get(name).copied().unwrap_or(FakeValue::Constant(0)) {
                FakeValue::Constant(v) => ("1".to_string(), v.to_string()),
                FakeValue::NonConstant => ("0".to_string(), sentinel.to_string()),
                FakeValue::Address => ("1".to_string(), "ptrtoint (ptr @.str to i64)".to_string()),
            };
            ir.push_str(&format!("@{} = dso_local global i32 {}, align 4\n", flag_symbol(name), flag));
            ir.push_str(&format!("@{} = dso_local global i64 {}, align 8\n", value_symbol(name), value));
        }
        Ok(CompileOutput::Artifact(ir))
    }

    fn name(&self) -> &str {
        "fake-cc"
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }
}
