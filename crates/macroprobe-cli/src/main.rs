//! macroprobe CLI
//!
//! Command-line interface for extracting C header macro values.

mod headers;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use macroprobe_core::{Annotation, Config, ExtractionTable, ProbeResult, ProbeStatus};
use macroprobe_parser::{scan_headers, Classifier, HeaderSource};
use macroprobe_probe::{expanded_header, ClangToolchain, MacroExtractor, Toolchain};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::headers::collect_headers;

#[derive(Parser)]
#[command(name = "macroprobe")]
#[command(author, version, about = "Extract C header macro values with the compiler", long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe headers and print the value table
    Extract {
        /// Header files or directories to walk
        #[arg(value_name = "PATH", required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Merge into an existing JSON table; new results win
        #[arg(long, value_name = "FILE")]
        merge: Option<PathBuf>,

        /// Leave out constants whose value is an address
        #[arg(long)]
        drop_address_derived: bool,

        /// Also probe macros pulled in through each header's includes
        #[arg(long)]
        expand_includes: bool,

        #[command(flatten)]
        options: ProbeOptions,
    },

    /// List definitions and their categories without compiling
    Scan {
        /// Header files or directories to walk
        #[arg(value_name = "PATH", required = true)]
        inputs: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// YAML configuration file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Check that clang can be run
    Check {
        #[command(flatten)]
        options: ProbeOptions,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

/// Settings that override the configuration file
#[derive(Args, Debug, Default)]
struct ProbeOptions {
    /// YAML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// clang executable
    #[arg(long, value_name = "PATH")]
    clang: Option<PathBuf>,

    /// Target triple
    #[arg(long)]
    target: Option<String>,

    /// Include directory
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Macro definition, NAME or NAME=VALUE
    #[arg(short = 'D', long = "define", value_name = "MACRO")]
    defines: Vec<String>,

    /// Extra argument passed to clang
    #[arg(long = "clang-arg", value_name = "ARG", allow_hyphen_values = true)]
    extra_args: Vec<String>,

    /// Seconds before a clang invocation is killed
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Concurrent clang invocations (0 = one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Macros per probe unit
    #[arg(long)]
    batch_size: Option<usize>,

    /// Do not carry `#include <...>` lines into probe units
    #[arg(long)]
    no_system_includes: bool,
}

impl ProbeOptions {
    fn load(&self) -> Result<Config> {
        let mut config = load_config(self.config.as_deref())?;

        let toolchain = &mut config.toolchain;
        if let Some(clang) = &self.clang {
            toolchain.clang = Some(clang.clone());
        }
        if let Some(target) = &self.target {
            toolchain.target = Some(target.clone());
        }
        toolchain.include_dirs.extend(self.include_dirs.iter().cloned());
        toolchain.defines.extend(self.defines.iter().cloned());
        toolchain.extra_args.extend(self.extra_args.iter().cloned());
        if let Some(timeout) = self.timeout {
            toolchain.timeout_secs = timeout;
        }

        let probe = &mut config.probe;
        if let Some(jobs) = self.jobs {
            probe.jobs = jobs;
        }
        if let Some(batch_size) = self.batch_size {
            probe.batch_size = batch_size;
        }
        if self.no_system_includes {
            probe.keep_system_includes = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Extract {
            inputs,
            output,
            format,
            merge,
            drop_address_derived,
            expand_includes,
            options,
        } => {
            let config = options.load()?;
            let mut table = cmd_extract(&inputs, &config, expand_includes)?;
            if let Some(existing) = merge {
                table = merge_into(&existing, table)?;
            }
            if drop_address_derived {
                table.retain(|r| !r.has_annotation(Annotation::AddressDerived));
            }
            write_output(&render_table(&table, format)?, output.as_deref())?;
        }
        Commands::Scan {
            inputs,
            format,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            cmd_scan(&inputs, &config, format)?;
        }
        Commands::Check { options } => {
            cmd_check(&options.load()?)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_headers(paths: &[PathBuf]) -> Result<Vec<HeaderSource>> {
    paths
        .iter()
        .map(|p| HeaderSource::from_file(p).with_context(|| format!("Failed to read {}", p.display())))
        .collect()
}

fn cmd_extract(inputs: &[PathBuf], config: &Config, expand_includes: bool) -> Result<ExtractionTable> {
    let paths = collect_headers(inputs, &config.scan)?;
    if paths.is_empty() {
        bail!("No headers found");
    }
    eprintln!("📂 Probing {} headers", paths.len());

    let toolchain = ClangToolchain::new(config.toolchain.clone())?;
    let headers = if expand_includes {
        let predefined = toolchain.predefined_macro_names()?;
        let mut headers = Vec::new();
        for path in &paths {
            headers.extend(expanded_header(&toolchain, path, &predefined)?);
        }
        headers
    } else {
        read_headers(&paths)?
    };

    let extractor = MacroExtractor::new(toolchain, config.probe.clone());
    let extraction = extractor.extract(&headers)?;
    for diagnostic in &extraction.scan_diagnostics {
        warn!("{}", diagnostic);
    }

    let summary = extraction.table.summary();
    eprintln!(
        "📊 {} macros: {} constant ({} address-derived), {} non-constant, {} compile errors",
        summary.total,
        summary.constant,
        summary.address_derived,
        summary.non_constant,
        summary.compile_error
    );
    Ok(extraction.table)
}

fn merge_into(existing: &Path, table: ExtractionTable) -> Result<ExtractionTable> {
    let text = std::fs::read_to_string(existing)
        .with_context(|| format!("Failed to read {}", existing.display()))?;
    let mut merged = ExtractionTable::from_json(&text)
        .with_context(|| format!("{} is not an extraction table", existing.display()))?;
    info!("Merging {} new results into {} existing", table.len(), merged.len());
    merged.merge(table);
    Ok(merged)
}

fn render_table(table: &ExtractionTable, format: Format) -> Result<String> {
    match format {
        Format::Json => Ok(table.to_json()?),
        Format::Text => Ok(table.iter().map(render_line).collect::<Vec<_>>().join("\n")),
    }
}

fn render_line(result: &ProbeResult) -> String {
    let mut line = match (result.status, result.value) {
        (ProbeStatus::Constant, Some(value)) => format!("{} = {}", result.macro_name, value),
        (status, _) => format!("{}: {}", result.macro_name, status),
    };
    if !result.annotations.is_empty() {
        let notes: Vec<String> = result.annotations.iter().map(|a| format!("{:?}", a)).collect();
        line.push_str(&format!("  [{}]", notes.join(", ")));
    }
    line
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", content))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("   Output written to: {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn cmd_scan(inputs: &[PathBuf], config: &Config, format: Format) -> Result<()> {
    let paths = collect_headers(inputs, &config.scan)?;
    let scans = scan_headers(&read_headers(&paths)?);
    let classifier = Classifier::with_declarations(scans.iter().flat_map(|s| s.declarations.iter()));

    let mut entries = Vec::new();
    for scan in &scans {
        for diagnostic in &scan.diagnostics {
            warn!("{}", diagnostic);
        }
        for definition in &scan.macros {
            entries.push((definition, classifier.classify(definition)));
        }
    }

    match format {
        Format::Json => {
            let list: Vec<_> = entries
                .iter()
                .map(|(def, category)| {
                    serde_json::json!({
                        "name": def.name,
                        "category": category,
                        "body": def.body,
                        "parameters": def.parameters,
                        "location": def.location,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        Format::Text => {
            for (def, category) in &entries {
                println!("{:<24} {:<22} {}", def.name, category, def.location);
            }
        }
    }
    Ok(())
}

fn cmd_check(config: &Config) -> Result<()> {
    let toolchain = ClangToolchain::new(config.toolchain.clone())?;
    println!("🔧 clang: {}", toolchain.clang_path().display());

    if !toolchain.is_available() {
        bail!("{} cannot be run", toolchain.clang_path().display());
    }
    if let Some(version) = toolchain.version() {
        println!("   {}", version);
    }
    println!("✅ Ready");
    Ok(())
}
