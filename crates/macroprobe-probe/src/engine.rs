//! Extraction engine
//!
//! Ties the pipeline together: scan headers, keep the winning definition of
//! every name, classify, probe the candidates in batches on a rayon pool,
//! and assemble the table in first-definition order.

use indexmap::IndexMap;
use macroprobe_core::{
    Error, ExtractionTable, MacroCategory, MacroDefinition, ProbeConfig, ProbeResult, Result,
};
use macroprobe_parser::{scan_headers, Classifier, HeaderSource, ScanDiagnostic, ScannedHeader};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::generator::{ProbeContext, ProbeGenerator};
use crate::isolate::{Candidate, IsolatingCompiler};
use crate::toolchain::{Toolchain, ToolchainError};

/// Outcome of one extraction run
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub table: ExtractionTable,
    /// Directives the scanner had to skip
    pub scan_diagnostics: Vec<ScanDiagnostic>,
}

/// Collects definitions across headers. A later definition of a name
/// replaces the earlier one but the name keeps its first position.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    winners: IndexMap<String, MacroDefinition>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, definition: MacroDefinition) {
        if let Some(previous) = self.winners.insert(definition.name.clone(), definition) {
            debug!("{} redefined, shadowing {}", previous.name, previous.location);
        }
    }

    pub fn add_scan(&mut self, scan: &ScannedHeader) {
        for definition in &scan.macros {
            self.add(definition.clone());
        }
    }

    pub fn definitions(&self) -> impl Iterator<Item = &MacroDefinition> {
        self.winners.values()
    }

    pub fn len(&self) -> usize {
        self.winners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }

    /// Build the table in winner order. Every name gets an entry; a name
    /// without a result is reported as a compile error.
    pub fn into_table(self, mut results: HashMap<String, ProbeResult>) -> ExtractionTable {
        self.winners
            .into_values()
            .map(|def| {
                results.remove(&def.name).unwrap_or_else(|| {
                    ProbeResult::compile_error(
                        &def.name,
                        MacroCategory::IntegerCandidate,
                        "no probe result was produced",
                    )
                    .with_location(def.location.clone())
                })
            })
            .collect()
    }
}

/// Extracts macro values using a [`Toolchain`]
pub struct MacroExtractor<T: Toolchain> {
    toolchain: T,
    config: ProbeConfig,
    generator: ProbeGenerator,
}

impl<T: Toolchain> MacroExtractor<T> {
    pub fn new(toolchain: T, config: ProbeConfig) -> Self {
        let generator = ProbeGenerator::new(config.sentinel);
        Self {
            toolchain,
            config,
            generator,
        }
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Scan and probe a set of headers, given in order
    pub fn extract(&self, headers: &[HeaderSource]) -> Result<Extraction> {
        let scans = scan_headers(headers);
        self.extract_scanned(&scans)
    }

    /// Probe headers that were already scanned
    pub fn extract_scanned(&self, scans: &[ScannedHeader]) -> Result<Extraction> {
        let mut aggregator = Aggregator::new();
        for scan in scans {
            aggregator.add_scan(scan);
        }

        let declarations: Vec<_> = scans
            .iter()
            .flat_map(|s| s.declarations.iter().cloned())
            .collect();
        let includes: Vec<String> = if self.config.keep_system_includes {
            scans
                .iter()
                .flat_map(|s| s.includes.iter())
                .filter(|i| i.system)
                .map(|i| i.to_directive())
                .collect()
        } else {
            Vec::new()
        };

        let classifier = Classifier::with_declarations(&declarations);
        let definitions: Vec<MacroDefinition> = aggregator.definitions().cloned().collect();

        let mut results = HashMap::with_capacity(definitions.len());
        let mut candidates = Vec::new();
        for definition in &definitions {
            let category = classifier.classify(definition);
            if category.is_probed() {
                candidates.push(Candidate::new(definition, category));
            } else {
                debug!("Skipping {} ({})", definition.name, category);
                results.insert(
                    definition.name.clone(),
                    ProbeResult::skipped(definition, category),
                );
            }
        }

        info!(
            "{} macros from {} headers, {} to probe",
            definitions.len(),
            scans.len(),
            candidates.len()
        );

        if !candidates.is_empty() {
            if !self.toolchain.is_available() {
                return Err(Error::ToolchainUnavailable(format!(
                    "{} cannot be run",
                    self.toolchain.name()
                )));
            }
            let context = ProbeContext::new(definitions.clone(), declarations, includes);
            for result in self.probe_all(&context, &candidates)? {
                results.insert(result.macro_name.clone(), result);
            }
        }

        let table = aggregator.into_table(results);
        let summary = table.summary();
        info!(
            "Extracted {} macros: {} constant, {} non-constant, {} compile errors",
            summary.total, summary.constant, summary.non_constant, summary.compile_error
        );

        Ok(Extraction {
            table,
            scan_diagnostics: scans
                .iter()
                .flat_map(|s| s.diagnostics.iter().cloned())
                .collect(),
        })
    }

    /// Probe candidates in batches of `batch_size`, `jobs` at a time
    fn probe_all(
        &self,
        context: &ProbeContext,
        candidates: &[Candidate<'_>],
    ) -> Result<Vec<ProbeResult>> {
        let batches: Vec<&[Candidate<'_>]> =
            candidates.chunks(self.config.batch_size.max(1)).collect();
        debug!("Probing {} candidates in {} batches", candidates.len(), batches.len());

        let compiler = IsolatingCompiler::new(&self.toolchain, &self.generator, context);
        let run = || {
            batches
                .par_iter()
                .map(|batch| compiler.resolve(batch))
                .collect::<std::result::Result<Vec<_>, ToolchainError>>()
        };

        let resolved = if self.config.jobs > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()
                .map_err(|e| Error::Config(format!("Failed to start worker pool: {}", e)))?;
            pool.install(run)
        } else {
            run()
        }?;

        Ok(resolved.into_iter().flatten().collect())
    }
}
