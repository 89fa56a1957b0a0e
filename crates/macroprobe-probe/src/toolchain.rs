//! Clang Toolchain Integration
//!
//! Compiles probe units to LLVM IR with clang. Each invocation runs in its
//! own temporary directory, which is removed on every exit path, and is
//! killed once the configured timeout elapses.

use macroprobe_core::ToolchainConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::generator::{ProbeUnit, UNIT_FILE_NAME};

static DEFINE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#define ([A-Za-z_]\w*)").expect("define regex is valid"));

/// Environment variable naming the clang executable
pub const CLANG_ENV: &str = "MACROPROBE_CLANG";

/// Errors that can occur while running the compiler
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("Clang not found. Please install clang.")]
    ClangNotFound,

    #[error("Failed to run {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Macro dump failed: {0}")]
    DumpFailed(String),
}

impl ToolchainError {
    /// Errors that make every further invocation pointless
    pub fn is_fatal(&self) -> bool {
        match self {
            ToolchainError::ClangNotFound => true,
            ToolchainError::Spawn { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<ToolchainError> for macroprobe_core::Error {
    fn from(err: ToolchainError) -> Self {
        match err {
            ToolchainError::IoError(e) => macroprobe_core::Error::Io(e),
            e if e.is_fatal() => macroprobe_core::Error::ToolchainUnavailable(e.to_string()),
            e => macroprobe_core::Error::Other(e.to_string()),
        }
    }
}

/// What a single compile produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutput {
    /// Compilation succeeded; the emitted LLVM IR
    Artifact(String),
    /// Compilation failed; the compiler's diagnostics
    Diagnostics(String),
    /// The compiler was killed after running this long
    TimedOut(Duration),
}

/// A compiler that can turn probe units into inspectable artifacts
pub trait Toolchain: Send + Sync {
    /// Compile one unit
    fn compile(&self, unit: &ProbeUnit) -> Result<CompileOutput, ToolchainError>;

    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Check that the compiler can be run at all
    fn is_available(&self) -> bool;
}

enum RunOutcome {
    Finished { status: ExitStatus, stderr: String },
    TimedOut,
}

/// Clang driven through its command line
#[derive(Debug, Clone)]
pub struct ClangToolchain {
    /// Path to clang executable
    clang_path: PathBuf,
    config: ToolchainConfig,
}

impl ClangToolchain {
    /// Create a toolchain from configuration, auto-detecting clang unless
    /// the configuration or `MACROPROBE_CLANG` names one
    pub fn new(config: ToolchainConfig) -> Result<Self, ToolchainError> {
        let clang_path = match &config.clang {
            Some(path) => path.clone(),
            None => Self::find_clang()?,
        };
        debug!("Using clang at: {:?}", clang_path);
        Ok(Self { clang_path, config })
    }

    /// Create a toolchain with a specific clang path
    pub fn with_path(clang_path: PathBuf, config: ToolchainConfig) -> Self {
        Self { clang_path, config }
    }

    /// Find clang executable
    fn find_clang() -> Result<PathBuf, ToolchainError> {
        if let Some(path) = std::env::var_os(CLANG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let candidates = [
            "clang",
            "/usr/bin/clang",
            "/usr/local/bin/clang",
            "/opt/homebrew/bin/clang",
            "/opt/homebrew/opt/llvm/bin/clang",
        ];

        for candidate in candidates {
            if let Ok(output) = Command::new(candidate).arg("--version").output() {
                if output.status.success() {
                    return Ok(PathBuf::from(candidate));
                }
            }
        }

        Err(ToolchainError::ClangNotFound)
    }

    pub fn clang_path(&self) -> &Path {
        &self.clang_path
    }

    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }

    /// Get clang version
    pub fn version(&self) -> Option<String> {
        Command::new(&self.clang_path)
            .arg("--version")
            .output()
            .ok()
            .and_then(|o| {
                String::from_utf8(o.stdout)
                    .ok()
                    .and_then(|s| s.lines().next().map(|l| l.to_string()))
            })
    }

    /// Target, include, define and pass-through arguments shared by every
    /// invocation
    fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(target) = &self.config.target {
            args.push(format!("--target={}", target));
        }

        for include in &self.config.include_dirs {
            args.push(format!("-I{}", include.display()));
        }

        for define in &self.config.defines {
            args.push(format!("-D{}", define));
        }

        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    fn compile_args(&self, source: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "-x",
            "c",
            "-S",
            "-emit-llvm",
            "-O0",
            "-ferror-limit=0",
            "-fno-color-diagnostics",
            "-fno-caret-diagnostics",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.build_args());
        args.push("-o".to_string());
        args.push(output.display().to_string());
        args.push(source.display().to_string());
        args
    }

    fn scratch_dir() -> Result<TempDir, ToolchainError> {
        Ok(tempfile::Builder::new().prefix("macroprobe-").tempdir()?)
    }

    /// Run clang with stderr captured to a file in `dir`, killing it once
    /// the timeout elapses
    fn run(&self, args: &[String], dir: &TempDir) -> Result<RunOutcome, ToolchainError> {
        let stderr_path = dir.path().join("stderr.txt");
        let stderr_file = File::create(&stderr_path)?;

        debug!("Running {:?} {:?}", self.clang_path, args);
        let mut child = Command::new(&self.clang_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file))
            .spawn()
            .map_err(|source| ToolchainError::Spawn {
                path: self.clang_path.clone(),
                source,
            })?;

        let timeout = self.config.timeout();
        match child.wait_timeout(timeout)? {
            Some(status) => {
                let stderr = String::from_utf8_lossy(&fs::read(&stderr_path)?).into_owned();
                Ok(RunOutcome::Finished { status, stderr })
            }
            None => {
                warn!("clang exceeded {:?}, killing it", timeout);
                let _ = child.kill();
                let _ = child.wait();
                Ok(RunOutcome::TimedOut)
            }
        }
    }

    /// Every macro visible after preprocessing `header`, as `#define` lines
    /// (`clang -E -dM`)
    pub fn dump_macros(&self, header: &Path) -> Result<String, ToolchainError> {
        let dir = Self::scratch_dir()?;
        let output = dir.path().join("macros.txt");

        let mut args: Vec<String> = ["-E", "-dM", "-x", "c"].iter().map(|s| s.to_string()).collect();
        args.extend(self.build_args());
        args.push("-o".to_string());
        args.push(output.display().to_string());
        args.push(header.display().to_string());

        match self.run(&args, &dir)? {
            RunOutcome::Finished { status, stderr } => {
                if !status.success() {
                    return Err(ToolchainError::DumpFailed(stderr));
                }
                Ok(String::from_utf8_lossy(&fs::read(&output)?).into_owned())
            }
            RunOutcome::TimedOut => Err(ToolchainError::DumpFailed(format!(
                "timed out after {:?}",
                self.config.timeout()
            ))),
        }
    }

    /// Names clang defines before reading any input
    pub fn predefined_macro_names(&self) -> Result<HashSet<String>, ToolchainError> {
        let dir = Self::scratch_dir()?;
        let empty = dir.path().join("empty.h");
        fs::write(&empty, "")?;
        let dump = self.dump_macros(&empty)?;
        Ok(define_names(&dump).collect())
    }
}

impl Toolchain for ClangToolchain {
    fn compile(&self, unit: &ProbeUnit) -> Result<CompileOutput, ToolchainError> {
        let dir = Self::scratch_dir()?;
        let source = dir.path().join(UNIT_FILE_NAME);
        let output = dir.path().join("macroprobe_unit.ll");
        fs::write(&source, &unit.source)?;

        match self.run(&self.compile_args(&source, &output), &dir)? {
            RunOutcome::TimedOut => Ok(CompileOutput::TimedOut(self.config.timeout())),
            RunOutcome::Finished { status, .. } if status.success() => {
                let ir = String::from_utf8_lossy(&fs::read(&output)?).into_owned();
                Ok(CompileOutput::Artifact(ir))
            }
            RunOutcome::Finished { stderr, .. } => Ok(CompileOutput::Diagnostics(stderr)),
        }
    }

    fn name(&self) -> &str {
        "clang"
    }

    fn is_available(&self) -> bool {
        Command::new(&self.clang_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Names of the `#define` lines in a `-dM` dump
pub fn define_names(dump: &str) -> impl Iterator<Item = String> + '_ {
    dump.lines()
        .filter_map(|line| DEFINE_NAME_RE.captures(line).map(|c| c[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn toolchain(config: ToolchainConfig) -> ClangToolchain {
        ClangToolchain::with_path(PathBuf::from("clang"), config)
    }

    #[test]
    fn test_build_args() {
        let config = ToolchainConfig {
            target: Some("x86_64-unknown-linux-gnu".into()),
            include_dirs: vec![PathBuf::from("/usr/include")],
            defines: vec!["NDEBUG".into(), "LEVEL=2".into()],
            extra_args: vec!["-std=c11".into()],
            ..ToolchainConfig::default()
        };
        let args = toolchain(config).build_args();
        assert_eq!(
            args,
            vec![
                "--target=x86_64-unknown-linux-gnu",
                "-I/usr/include",
                "-DNDEBUG",
                "-DLEVEL=2",
                "-std=c11",
            ]
        );
    }

    #[test]
    fn test_compile_args() {
        let args = toolchain(ToolchainConfig::default())
            .compile_args(Path::new("/tmp/u/macroprobe_unit.c"), Path::new("/tmp/u/out.ll"));
        assert_eq!(&args[..4], &["-x", "c", "-S", "-emit-llvm"]);
        assert!(args.contains(&"-ferror-limit=0".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/u/macroprobe_unit.c"));
    }

    #[test]
    fn test_define_names() {
        let dump = "#define __STDC__ 1\n#define FOO(x) x\n#define BAR\n";
        assert_eq!(define_names(dump).collect::<Vec<_>>(), vec!["__STDC__", "FOO", "BAR"]);
    }

    #[test]
    fn test_missing_compiler_is_fatal() {
        let tc = ClangToolchain::with_path(
            PathBuf::from("/nonexistent/macroprobe-clang"),
            ToolchainConfig::default(),
        );
        assert!(!tc.is_available());

        let unit = crate::generator::ProbeGenerator::new(0).generate(
            &crate::generator::ProbeContext::default(),
            &[],
            false,
        );
        let err = tc.compile(&unit).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            macroprobe_core::Error::from(err),
            macroprobe_core::Error::ToolchainUnavailable(_)
        ));
    }
}
