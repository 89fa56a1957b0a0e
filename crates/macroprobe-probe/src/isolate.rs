//! Failure isolation
//!
//! A single bad macro must not cost the rest of its batch their values.
//! When a unit fails to compile, errors located inside fragments are
//! charged to those macros and the rest are recompiled. Errors that cannot
//! be located split the batch in halves until each failing macro stands
//! alone. A failure in the `#include` lines is retried once without them.
//! A definition or declaration clang rejects in the preamble is left out of
//! every later unit; a probed macro whose own definition was rejected fails.

use macroprobe_core::{MacroCategory, MacroDefinition, ProbeResult};
use tracing::{debug, warn};

use crate::artifact::read_globals;
use crate::extract::interpret;
use crate::generator::{Exclusions, PreambleItem, ProbeContext, ProbeGenerator};
use crate::toolchain::{CompileOutput, Toolchain, ToolchainError};

/// Prefix shared by every probe global
const PROBE_PREFIX: &str = "__macroprobe_";

/// A definition selected for probing, with its category
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub definition: &'a MacroDefinition,
    pub category: MacroCategory,
}

impl<'a> Candidate<'a> {
    pub fn new(definition: &'a MacroDefinition, category: MacroCategory) -> Self {
        Self {
            definition,
            category,
        }
    }

    fn name(&self) -> &str {
        &self.definition.name
    }

    fn failed(&self, diagnostic: impl Into<String>) -> ProbeResult {
        ProbeResult::compile_error(self.name(), self.category, diagnostic)
            .with_location(self.definition.location.clone())
    }
}

struct Job<'a> {
    candidates: Vec<Candidate<'a>>,
    with_includes: bool,
}

/// Compiles a batch, isolating failures down to individual macros
pub struct IsolatingCompiler<'t> {
    toolchain: &'t dyn Toolchain,
    generator: &'t ProbeGenerator,
    context: &'t ProbeContext,
}

impl<'t> IsolatingCompiler<'t> {
    pub fn new(
        toolchain: &'t dyn Toolchain,
        generator: &'t ProbeGenerator,
        context: &'t ProbeContext,
    ) -> Self {
        Self {
            toolchain,
            generator,
            context,
        }
    }

    /// Produce exactly one result per candidate. Only a fatal toolchain
    /// error aborts.
    pub fn resolve(&self, batch: &[Candidate<'_>]) -> Result<Vec<ProbeResult>, ToolchainError> {
        let mut results = Vec::with_capacity(batch.len());
        let mut compiles = 0usize;
        let mut excluded = Exclusions::default();
        let mut work = vec![Job {
            candidates: batch.to_vec(),
            with_includes: true,
        }];

        while let Some(job) = work.pop() {
            if job.candidates.is_empty() {
                continue;
            }

            let definitions: Vec<&MacroDefinition> =
                job.candidates.iter().map(|c| c.definition).collect();
            let unit = self.generator.generate_excluding(
                self.context,
                &definitions,
                job.with_includes,
                &excluded,
            );
            compiles += 1;

            let output = match self.toolchain.compile(&unit) {
                Ok(output) => output,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("{} failed on a unit of {}: {}", self.toolchain.name(), definitions.len(), e);
                    let message = e.to_string();
                    results.extend(job.candidates.iter().map(|c| c.failed(message.clone())));
                    continue;
                }
            };

            match output {
                CompileOutput::Artifact(ir) => {
                    let globals = read_globals(&ir, PROBE_PREFIX);
                    results.extend(job.candidates.iter().map(|c| {
                        interpret(c.definition, c.category, &globals, self.generator.sentinel())
                    }));
                }
                CompileOutput::TimedOut(limit) => {
                    let message = format!("compiler timed out after {:?}", limit);
                    results.extend(job.candidates.iter().map(|c| c.failed(message.clone())));
                }
                CompileOutput::Diagnostics(text) => {
                    let blame = unit.blame(&text);

                    let retry_without_includes = blame.in_includes && job.with_includes;
                    let rejected: Vec<&PreambleItem> = if retry_without_includes {
                        Vec::new()
                    } else {
                        blame.entries.keys().filter(|item| excluded.insert(item)).collect()
                    };

                    if retry_without_includes {
                        debug!("Include lines failed, retrying {} probes without them", job.candidates.len());
                        work.push(Job {
                            candidates: job.candidates,
                            with_includes: false,
                        });
                    } else if !rejected.is_empty() {
                        debug!("Dropping {} rejected preamble entries", rejected.len());
                        let (failed, rest): (Vec<_>, Vec<_>) =
                            job.candidates.into_iter().partition(|c| {
                                rejected.iter().any(|item| {
                                    matches!(item, PreambleItem::Definition(name) if name == c.name())
                                })
                            });
                        for candidate in failed {
                            let item = PreambleItem::Definition(candidate.name().to_string());
                            results.push(candidate.failed(blame.entries[&item].clone()));
                        }
                        work.push(Job {
                            candidates: rest,
                            with_includes: job.with_includes,
                        });
                    } else if job.candidates.len() == 1 {
                        let candidate = job.candidates[0];
                        let diagnostic = blame
                            .fragments
                            .get(candidate.name())
                            .cloned()
                            .unwrap_or(text);
                        results.push(candidate.failed(diagnostic));
                    } else if blame.is_local() {
                        let (blamed, rest): (Vec<_>, Vec<_>) = job
                            .candidates
                            .into_iter()
                            .partition(|c| blame.fragments.contains_key(c.name()));
                        debug!("{} fragments failed, recompiling {}", blamed.len(), rest.len());
                        for candidate in blamed {
                            results.push(candidate.failed(blame.fragments[candidate.name()].clone()));
                        }
                        work.push(Job {
                            candidates: rest,
                            with_includes: job.with_includes,
                        });
                    } else {
                        let mut candidates = job.candidates;
                        let upper = candidates.split_off(candidates.len() / 2);
                        debug!("Unlocated errors, bisecting {} + {}", candidates.len(), upper.len());
                        work.push(Job {
                            candidates: upper,
                            with_includes: job.with_includes,
                        });
                        work.push(Job {
                            candidates,
                            with_includes: job.with_includes,
                        });
                    }
                }
            }
        }

        debug!("Resolved {} probes with {} compiles", batch.len(), compiles);
        Ok(results)
    }
}
