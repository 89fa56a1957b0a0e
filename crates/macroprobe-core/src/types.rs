//! Core type definitions

use crate::location::Location;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A `#define` directive as written in a header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroDefinition {
    /// Macro name
    pub name: String,
    /// Parameter names of a function-like macro (`...` is kept verbatim)
    pub parameters: Vec<String>,
    /// Replacement text, unexpanded, continuation lines joined
    pub body: String,
    /// Where the definition starts
    pub location: Location,
    /// Whether the name is immediately followed by `(`
    pub is_function_like: bool,
}

impl MacroDefinition {
    /// Create an object-like macro
    pub fn object_like(name: impl Into<String>, body: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            body: body.into(),
            location,
            is_function_like: false,
        }
    }

    /// Create a function-like macro
    pub fn function_like(
        name: impl Into<String>,
        parameters: Vec<String>,
        body: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            body: body.into(),
            location,
            is_function_like: true,
        }
    }

    /// Whether the replacement text is empty (include guards, feature flags)
    pub fn has_empty_body(&self) -> bool {
        self.body.trim().is_empty()
    }

    /// Render back as a single-line `#define`
    pub fn to_directive(&self) -> String {
        let head = if self.is_function_like {
            format!("{}({})", self.name, self.parameters.join(", "))
        } else {
            self.name.clone()
        };
        format!("#define {} {}", head, self.body.trim())
            .trim_end()
            .to_string()
    }
}

/// Pre-probe category of a macro, assigned once by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MacroCategory {
    /// Sent to the compiler for probing
    IntegerCandidate,
    /// Has parameters; never probed
    FunctionLike,
    /// String or floating literal; probed but pre-flagged
    ObviouslyNonInteger,
    /// Bare type name; cannot be probed as a value
    UnresolvableType,
}

impl MacroCategory {
    /// Whether macros of this category get a probe fragment
    pub fn is_probed(self) -> bool {
        matches!(
            self,
            MacroCategory::IntegerCandidate | MacroCategory::ObviouslyNonInteger
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MacroCategory::IntegerCandidate => "INTEGER_CANDIDATE",
            MacroCategory::FunctionLike => "FUNCTION_LIKE",
            MacroCategory::ObviouslyNonInteger => "OBVIOUSLY_NON_INTEGER",
            MacroCategory::UnresolvableType => "UNRESOLVABLE_TYPE",
        }
    }
}

impl std::fmt::Display for MacroCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of top-level declaration found in a header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    /// `extern int counter;`
    Variable,
    /// `int get_value(void);`
    Function,
    /// `typedef unsigned int u32;`
    Typedef,
    /// `struct`, `union` or `enum` definition
    Tag,
}

/// A top-level declaration that probe units may need to forward-declare
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub kind: DeclarationKind,
    /// Identifiers introduced (declarators, tag names, enumerators)
    pub names: Vec<String>,
    /// Source text, terminated by `;`
    pub text: String,
    pub location: Location,
}

/// Outcome of probing one macro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeStatus {
    Constant,
    NonConstant,
    CompileError,
}

impl ProbeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeStatus::Constant => "CONSTANT",
            ProbeStatus::NonConstant => "NON_CONSTANT",
            ProbeStatus::CompileError => "COMPILE_ERROR",
        }
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secondary flags qualifying a probe result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Annotation {
    /// Value comes from an address (string literal, `&symbol`), not a number
    AddressDerived,
    /// Body was lexically a string or floating literal
    NonIntegerLiteral,
    /// Body was empty; reported as `1`
    EmptyBody,
    /// Constancy was decided from the sentinel value alone
    SentinelFallback,
}

/// Result for one macro name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub macro_name: String,
    pub status: ProbeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    /// Compiler diagnostics, only for `COMPILE_ERROR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_diagnostic: Option<String>,
    pub category: MacroCategory,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ProbeResult {
    fn new(name: impl Into<String>, status: ProbeStatus, category: MacroCategory) -> Self {
        Self {
            macro_name: name.into(),
            status,
            value: None,
            raw_diagnostic: None,
            category,
            annotations: Vec::new(),
            location: None,
        }
    }

    /// A compile-time constant with a known value
    pub fn constant(name: impl Into<String>, value: i64, category: MacroCategory) -> Self {
        let mut result = Self::new(name, ProbeStatus::Constant, category);
        result.value = Some(value);
        result
    }

    /// A constant whose initializer is an address. No numeric value exists
    /// at compile time, so it serializes as `CONSTANT` without a `value`
    /// field and with the `ADDRESS_DERIVED` annotation.
    pub fn address_derived(name: impl Into<String>, category: MacroCategory) -> Self {
        Self::new(name, ProbeStatus::Constant, category).with_annotation(Annotation::AddressDerived)
    }

    pub fn non_constant(name: impl Into<String>, category: MacroCategory) -> Self {
        Self::new(name, ProbeStatus::NonConstant, category)
    }

    pub fn compile_error(
        name: impl Into<String>,
        category: MacroCategory,
        diagnostic: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(name, ProbeStatus::CompileError, category);
        result.raw_diagnostic = Some(diagnostic.into());
        result
    }

    /// Result for a macro the classifier excluded from probing
    pub fn skipped(definition: &MacroDefinition, category: MacroCategory) -> Self {
        Self::non_constant(&definition.name, category).with_location(definition.location.clone())
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        if !self.annotations.contains(&annotation) {
            self.annotations.push(annotation);
        }
        self
    }

    pub fn has_annotation(&self, annotation: Annotation) -> bool {
        self.annotations.contains(&annotation)
    }

    pub fn is_constant(&self) -> bool {
        self.status == ProbeStatus::Constant
    }

    /// A numeric constant that is not address-derived
    pub fn is_reliable(&self) -> bool {
        self.is_constant()
            && self.value.is_some()
            && !self.has_annotation(Annotation::AddressDerived)
    }
}

/// Per-status counts of an extraction table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub total: usize,
    pub constant: usize,
    pub non_constant: usize,
    pub compile_error: usize,
    pub address_derived: usize,
}

/// Final name → result mapping, iterated in first-definition order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionTable {
    entries: IndexMap<String, ProbeResult>,
}

impl ExtractionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-printed JSON object keyed by macro name
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a table previously written by [`ExtractionTable::to_json`]
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Insert a result. A later result for the same name replaces the
    /// earlier one but keeps its position.
    pub fn insert(&mut self, result: ProbeResult) -> Option<ProbeResult> {
        self.entries.insert(result.macro_name.clone(), result)
    }

    /// Merge another table into this one; entries from `other` win
    pub fn merge(&mut self, other: ExtractionTable) {
        for (_, result) in other.entries {
            self.insert(result);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ProbeResult> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeResult> {
        self.entries.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Name/value pairs of every reliable constant
    pub fn constants(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries
            .values()
            .filter(|r| r.is_reliable())
            .filter_map(|r| r.value.map(|v| (r.macro_name.as_str(), v)))
    }

    /// Keep only entries matching the predicate, preserving order
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&ProbeResult) -> bool,
    {
        self.entries.retain(|_, result| keep(result));
    }

    pub fn summary(&self) -> TableSummary {
        let mut summary = TableSummary {
            total: self.entries.len(),
            ..TableSummary::default()
        };
        for result in self.entries.values() {
            match result.status {
                ProbeStatus::Constant => summary.constant += 1,
                ProbeStatus::NonConstant => summary.non_constant += 1,
                ProbeStatus::CompileError => summary.compile_error += 1,
            }
            if result.has_annotation(Annotation::AddressDerived) {
                summary.address_derived += 1;
            }
        }
        summary
    }
}

impl IntoIterator for ExtractionTable {
    type Item = ProbeResult;
    type IntoIter = indexmap::map::IntoValues<String, ProbeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl FromIterator<ProbeResult> for ExtractionTable {
    fn from_iter<I: IntoIterator<Item = ProbeResult>>(iter: I) -> Self {
        let mut table = ExtractionTable::new();
        for result in iter {
            table.insert(result);
        }
        table
    }
}
