//! Probe Unit Generation
//!
//! Turns a batch of macro definitions into one C translation unit. Every
//! macro gets a fragment of two global initializers: a flag holding
//! `__builtin_constant_p(NAME)` and a value holding the macro cast to
//! `long long`, or the sentinel when it is not a constant. Fragment line
//! spans are recorded so compiler diagnostics can be blamed on the macro
//! that caused them.

use indexmap::IndexSet;
use macroprobe_core::{Declaration, MacroDefinition};
use macroprobe_parser::lexer::identifiers;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};

/// File name of every probe unit, as it appears in diagnostics
pub const UNIT_FILE_NAME: &str = "macroprobe_unit.c";

/// Prefix of the global holding a macro's value
pub const VALUE_PREFIX: &str = "__macroprobe_value_";

/// Prefix of the global holding a macro's `__builtin_constant_p` flag
pub const FLAG_PREFIX: &str = "__macroprobe_const_";

/// Warnings silenced inside each fragment. Casting an address or an
/// oversized constant to `long long` is exactly what a probe does.
const SUPPRESSED_WARNINGS: &[&str] = &[
    "-Weverything",
    "-Wint-conversion",
    "-Wpointer-to-int-cast",
    "-Wvoid-pointer-to-int-cast",
    "-Wconstant-conversion",
    "-Wshift-overflow",
];

static DIAGNOSTIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?):(\d+):(?:\d+:)? (fatal error|error|warning|note): ")
        .expect("diagnostic regex is valid")
});

pub fn value_symbol(macro_name: &str) -> String {
    format!("{}{}", VALUE_PREFIX, macro_name)
}

pub fn flag_symbol(macro_name: &str) -> String {
    format!("{}{}", FLAG_PREFIX, macro_name)
}

/// Everything known about the headers that a probe unit may need besides
/// the probed macros themselves
#[derive(Debug, Clone, Default)]
pub struct ProbeContext {
    /// Rendered `#include <...>` lines
    includes: Vec<String>,
    /// Harvested declarations, deduplicated by text
    declarations: Vec<Declaration>,
    /// Winning definitions in first-definition order
    definitions: Vec<MacroDefinition>,
    /// Macro name -> index into `definitions`
    defined: HashMap<String, usize>,
    /// Identifiers appearing in each macro body
    macro_refs: HashMap<String, Vec<String>>,
    /// Declared name -> indices into `declarations`
    declared: HashMap<String, Vec<usize>>,
}

/// Indices of the definitions and declarations a batch reaches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reachable {
    pub definitions: BTreeSet<usize>,
    pub declarations: BTreeSet<usize>,
}

impl ProbeContext {
    pub fn new(
        definitions: Vec<MacroDefinition>,
        declarations: Vec<Declaration>,
        includes: Vec<String>,
    ) -> Self {
        let includes: IndexSet<String> = includes.into_iter().collect();

        let mut seen = HashSet::new();
        let declarations: Vec<Declaration> = declarations
            .into_iter()
            .filter(|d| seen.insert(d.text.clone()))
            .collect();

        let mut declared: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, decl) in declarations.iter().enumerate() {
            for name in &decl.names {
                declared.entry(name.clone()).or_default().push(index);
            }
        }

        let defined = definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        let macro_refs = definitions
            .iter()
            .map(|d| (d.name.clone(), identifiers(&d.body)))
            .collect();

        Self {
            includes: includes.into_iter().collect(),
            declarations,
            definitions,
            defined,
            macro_refs,
            declared,
        }
    }

    pub fn definitions(&self) -> &[MacroDefinition] {
        &self.definitions
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Transitive closure over the identifiers of the given macros. A name
    /// leads to its definition and to the declarations of it; their text
    /// may name further macros and declarations. Excluded entries are
    /// neither emitted nor followed.
    pub fn reachable(&self, roots: &[&MacroDefinition], excluded: &Exclusions) -> Reachable {
        let mut queue: Vec<String> = roots.iter().map(|d| d.name.clone()).collect();
        let mut visited = HashSet::new();
        let mut reachable = Reachable::default();

        while let Some(ident) = queue.pop() {
            if !visited.insert(ident.clone()) {
                continue;
            }
            if let Some(&index) = self.defined.get(&ident) {
                if !excluded.definitions.contains(&ident) && reachable.definitions.insert(index) {
                    if let Some(refs) = self.macro_refs.get(&ident) {
                        queue.extend(refs.iter().cloned());
                    }
                }
            }
            if let Some(indices) = self.declared.get(&ident) {
                for &index in indices {
                    if !excluded.declarations.contains(&index) && reachable.declarations.insert(index) {
                        queue.extend(identifiers(&self.declarations[index].text));
                    }
                }
            }
        }

        reachable
    }

    /// Declarations reachable from the given macros, in header order
    pub fn referenced_declarations(&self, roots: &[&MacroDefinition]) -> Vec<&Declaration> {
        self.reachable(roots, &Exclusions::default())
            .declarations
            .into_iter()
            .map(|i| &self.declarations[i])
            .collect()
    }

    /// Definitions reachable from the given macros, including the macros
    /// themselves, in first-definition order
    pub fn referenced_definitions(&self, roots: &[&MacroDefinition]) -> Vec<&MacroDefinition> {
        self.reachable(roots, &Exclusions::default())
            .definitions
            .into_iter()
            .map(|i| &self.definitions[i])
            .collect()
    }
}

/// A preamble entry that can be left out of later units
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PreambleItem {
    /// The `#undef`/`#define` pair of a macro
    Definition(String),
    /// A harvested declaration, by index into the context
    Declaration(usize),
}

/// Preamble entries clang rejected, kept out of subsequent units
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    pub definitions: HashSet<String>,
    pub declarations: HashSet<usize>,
}

impl Exclusions {
    /// Returns false if the item was already excluded
    pub fn insert(&mut self, item: &PreambleItem) -> bool {
        match item {
            PreambleItem::Definition(name) => self.definitions.insert(name.clone()),
            PreambleItem::Declaration(index) => self.declarations.insert(*index),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.declarations.is_empty()
    }
}

/// Line span of one preamble entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreambleEntry {
    pub item: PreambleItem,
    pub first_line: u32,
    pub last_line: u32,
}

/// Lines that precede the fragments of a unit
#[derive(Debug, Clone, Default)]
pub struct Preamble {
    pub text: String,
    /// Number of lines in `text`
    pub lines: u32,
    /// 1-based inclusive line range holding `#include` lines
    pub include_lines: Option<(u32, u32)>,
    pub entries: Vec<PreambleEntry>,
}

impl Preamble {
    pub fn entry_at(&self, line: u32) -> Option<&PreambleEntry> {
        self.entries
            .iter()
            .find(|e| (e.first_line..=e.last_line).contains(&line))
    }
}

/// Line span of one macro's fragment within a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSpan {
    pub macro_name: String,
    pub first_line: u32,
    pub last_line: u32,
}

impl FragmentSpan {
    pub fn contains(&self, line: u32) -> bool {
        (self.first_line..=self.last_line).contains(&line)
    }
}

/// A generated translation unit
#[derive(Debug, Clone)]
pub struct ProbeUnit {
    pub source: String,
    pub fragments: Vec<FragmentSpan>,
    pub preamble: Preamble,
}

impl ProbeUnit {
    pub fn macro_names(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().map(|f| f.macro_name.as_str())
    }

    pub fn fragment_at(&self, line: u32) -> Option<&FragmentSpan> {
        self.fragments.iter().find(|f| f.contains(line))
    }

    /// Attribute the errors in compiler output to fragments
    pub fn blame(&self, diagnostics: &str) -> Blame {
        let mut blame = Blame::default();
        let mut errors = 0;

        for block in split_diagnostics(diagnostics) {
            if !block.is_error {
                continue;
            }
            errors += 1;

            let in_unit = block
                .file
                .as_deref()
                .is_some_and(|f| f.ends_with(UNIT_FILE_NAME));
            let line = block.line.filter(|_| in_unit);

            match line {
                Some(line) => {
                    if let Some(span) = self.fragment_at(line) {
                        let entry = blame.fragments.entry(span.macro_name.clone()).or_default();
                        entry.push_str(&block.text);
                    } else if let Some(found) = self.preamble.entry_at(line) {
                        let entry = blame.entries.entry(found.item.clone()).or_default();
                        entry.push_str(&block.text);
                    } else {
                        blame.in_preamble = true;
                        if self
                            .preamble
                            .include_lines
                            .is_some_and(|(first, last)| (first..=last).contains(&line))
                        {
                            blame.in_includes = true;
                        }
                    }
                }
                // Errors inside included headers come from the includes
                None if block.file.is_some() && !in_unit => {
                    blame.in_preamble = true;
                    blame.in_includes = self.preamble.include_lines.is_some();
                }
                None => blame.unattributed = true,
            }
        }

        if errors == 0 {
            blame.unattributed = true;
        }
        blame
    }
}

/// Where the errors of a failed compile came from
#[derive(Debug, Clone, Default)]
pub struct Blame {
    /// Macro name -> diagnostics located inside its fragment
    pub fragments: HashMap<String, String>,
    /// Preamble definition or declaration -> diagnostics on its lines
    pub entries: HashMap<PreambleItem, String>,
    /// Some error lies elsewhere in the preamble
    pub in_preamble: bool,
    /// Some error lies in (or under) the `#include` lines
    pub in_includes: bool,
    /// Some error could not be located at all
    pub unattributed: bool,
}

impl Blame {
    /// Only fragment errors: the remaining fragments can be retried as-is
    pub fn is_local(&self) -> bool {
        !self.fragments.is_empty()
            && self.entries.is_empty()
            && !self.in_preamble
            && !self.unattributed
    }
}

/// One diagnostic together with its continuation lines
#[derive(Debug, Clone, PartialEq, Eq)]
struct DiagnosticBlock {
    file: Option<String>,
    line: Option<u32>,
    is_error: bool,
    text: String,
}

fn split_diagnostics(output: &str) -> Vec<DiagnosticBlock> {
    let mut blocks: Vec<DiagnosticBlock> = Vec::new();

    for line in output.lines() {
        if let Some(caps) = DIAGNOSTIC_RE.captures(line) {
            let severity = &caps[3];
            if severity != "note" || blocks.is_empty() {
                blocks.push(DiagnosticBlock {
                    file: Some(caps[1].to_string()),
                    line: caps[2].parse().ok(),
                    is_error: severity.ends_with("error"),
                    text: String::new(),
                });
            }
        } else if line.starts_with("error: ") || line.contains(": error: ") {
            // driver errors such as `clang: error: ...` carry no location
            blocks.push(DiagnosticBlock {
                file: None,
                line: None,
                is_error: true,
                text: String::new(),
            });
        } else if line.ends_with("generated.") || blocks.is_empty() {
            continue;
        }

        if let Some(block) = blocks.last_mut() {
            block.text.push_str(line);
            block.text.push('\n');
        }
    }

    blocks
}

/// Renders probe units
#[derive(Debug, Clone)]
pub struct ProbeGenerator {
    sentinel: i64,
}

impl ProbeGenerator {
    pub fn new(sentinel: i64) -> Self {
        Self { sentinel }
    }

    pub fn sentinel(&self) -> i64 {
        self.sentinel
    }

    /// Build the preamble for a set of probed macros. Only the definitions
    /// and declarations the batch actually reaches are emitted, so a
    /// smaller batch gets a smaller preamble. Definitions come first since
    /// declarations may spell array bounds or attributes with macros.
    pub fn preamble(
        &self,
        context: &ProbeContext,
        batch: &[&MacroDefinition],
        with_includes: bool,
        excluded: &Exclusions,
    ) -> Preamble {
        let mut lines: Vec<String> = vec![format!("/* macroprobe unit: {} probes */", batch.len())];
        let mut entries = Vec::new();

        let mut include_lines = None;
        if with_includes && !context.includes.is_empty() {
            let first = lines.len() as u32 + 1;
            lines.extend(context.includes.iter().cloned());
            include_lines = Some((first, lines.len() as u32));
        }

        let reachable = context.reachable(batch, excluded);

        for &index in &reachable.definitions {
            let def = &context.definitions[index];
            let first_line = lines.len() as u32 + 1;
            lines.push(format!("#undef {}", def.name));
            lines.push(def.to_directive());
            entries.push(PreambleEntry {
                item: PreambleItem::Definition(def.name.clone()),
                first_line,
                last_line: lines.len() as u32,
            });
        }

        for &index in &reachable.declarations {
            let first_line = lines.len() as u32 + 1;
            lines.extend(context.declarations[index].text.lines().map(str::to_string));
            entries.push(PreambleEntry {
                item: PreambleItem::Declaration(index),
                first_line,
                last_line: (lines.len() as u32).max(first_line),
            });
        }
        lines.push(String::new());

        let mut text = lines.join("\n");
        text.push('\n');
        Preamble {
            text,
            lines: lines.len() as u32,
            include_lines,
            entries,
        }
    }

    /// Generate a unit probing every definition in `batch`
    pub fn generate(
        &self,
        context: &ProbeContext,
        batch: &[&MacroDefinition],
        with_includes: bool,
    ) -> ProbeUnit {
        self.generate_excluding(context, batch, with_includes, &Exclusions::default())
    }

    /// Generate a unit, leaving the excluded preamble entries out
    pub fn generate_excluding(
        &self,
        context: &ProbeContext,
        batch: &[&MacroDefinition],
        with_includes: bool,
        excluded: &Exclusions,
    ) -> ProbeUnit {
        let preamble = self.preamble(context, batch, with_includes, excluded);
        let mut source = preamble.text.clone();
        let mut next_line = preamble.lines + 1;
        let mut fragments = Vec::with_capacity(batch.len());

        for def in batch {
            let lines = self.fragment(def);
            let count = lines.len() as u32;
            for line in &lines {
                source.push_str(line);
                source.push('\n');
            }
            fragments.push(FragmentSpan {
                macro_name: def.name.clone(),
                first_line: next_line,
                last_line: next_line + count - 1,
            });
            next_line += count;
        }

        ProbeUnit {
            source,
            fragments,
            preamble,
        }
    }

    fn fragment(&self, def: &MacroDefinition) -> Vec<String> {
        let name = &def.name;
        let (flag, value) = if def.has_empty_body() {
            ("1".to_string(), "1LL".to_string())
        } else {
            (
                format!("__builtin_constant_p({})", name),
                format!(
                    "__builtin_choose_expr(__builtin_constant_p({n}), (long long)({n}), {s})",
                    n = name,
                    s = sentinel_literal(self.sentinel)
                ),
            )
        };

        let mut lines = Vec::with_capacity(SUPPRESSED_WARNINGS.len() + 5);
        lines.push(format!(
            "/* {} @ {} */",
            name,
            def.location.to_string().replace("*/", "* /")
        ));
        lines.push("#pragma clang diagnostic push".to_string());
        for warning in SUPPRESSED_WARNINGS {
            lines.push(format!("#pragma clang diagnostic ignored \"{}\"", warning));
        }
        lines.push(format!("int {} = {};", flag_symbol(name), flag));
        lines.push(format!("long long {} = {};", value_symbol(name), value));
        lines.push("#pragma clang diagnostic pop".to_string());
        lines
    }
}

/// C spelling of a `long long` literal; `-LLONG_MAX - 1` has no literal form
fn sentinel_literal(value: i64) -> String {
    if value == i64::MIN {
        format!("(-{}LL - 1)", i64::MAX)
    } else if value < 0 {
        format!("(-{}LL)", value.unsigned_abs())
    } else {
        format!("{}LL", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macroprobe_core::{DeclarationKind, Location};
    use pretty_assertions::assert_eq;

    fn def(name: &str, body: &str) -> MacroDefinition {
        MacroDefinition::object_like(name, body, Location::new("t.h", 1))
    }

    fn decl(kind: DeclarationKind, name: &str, text: &str) -> Declaration {
        Declaration {
            kind,
            names: vec![name.to_string()],
            text: text.to_string(),
            location: Location::new("t.h", 1),
        }
    }

    fn context() -> ProbeContext {
        ProbeContext::new(
            vec![
                def("FLAG_A", "0x01"),
                def("FLAG_B", "0x02"),
                def("FLAG_C", "(FLAG_A | FLAG_B)"),
                def("INV_GLOBAL", "GLOBAL_VAR"),
                def("ALIAS", "INV_GLOBAL"),
                MacroDefinition::function_like(
                    "ADD",
                    vec!["x".into(), "y".into()],
                    "((x) + (y))",
                    Location::new("t.h", 9),
                ),
            ],
            vec![
                decl(DeclarationKind::Typedef, "counter_t", "typedef long counter_t;"),
                decl(DeclarationKind::Variable, "GLOBAL_VAR", "extern counter_t GLOBAL_VAR;"),
                decl(DeclarationKind::Variable, "GLOBAL_VAR", "extern counter_t GLOBAL_VAR;"),
                decl(DeclarationKind::Function, "unused", "int unused(void);"),
            ],
            vec!["#include <stdint.h>".into(), "#include <stdint.h>".into()],
        )
    }

    #[test]
    fn test_sentinel_literal() {
        assert_eq!(sentinel_literal(i64::MIN + 1), "(-9223372036854775807LL)");
        assert_eq!(sentinel_literal(i64::MIN), "(-9223372036854775807LL - 1)");
        assert_eq!(sentinel_literal(7), "7LL");
    }

    #[test]
    fn test_context_dedup() {
        let ctx = context();
        assert_eq!(ctx.declarations().len(), 3);
        assert_eq!(ctx.includes, vec!["#include <stdint.h>"]);
    }

    #[test]
    fn test_referenced_declarations_follow_macros_and_types() {
        let ctx = context();
        let alias = ctx.definitions()[4].clone();
        let names: Vec<&str> = ctx
            .referenced_declarations(&[&alias])
            .iter()
            .map(|d| d.names[0].as_str())
            .collect();
        assert_eq!(names, vec!["counter_t", "GLOBAL_VAR"]);

        let flag_c = ctx.definitions()[2].clone();
        assert!(ctx.referenced_declarations(&[&flag_c]).is_empty());
    }

    #[test]
    fn test_unit_layout() {
        let ctx = context();
        let generator = ProbeGenerator::new(i64::MIN + 1);
        let flag_c = ctx.definitions()[2].clone();
        let alias = ctx.definitions()[4].clone();
        let unit = generator.generate(&ctx, &[&flag_c, &alias], true);

        assert_eq!(unit.preamble.include_lines, Some((2, 2)));
        assert!(unit.source.contains("#undef FLAG_A\n#define FLAG_A 0x01\n"));
        assert!(unit.source.contains("#define INV_GLOBAL GLOBAL_VAR\n"));
        assert!(unit.source.contains("extern counter_t GLOBAL_VAR;"));
        assert!(!unit.source.contains("int unused(void);"));
        assert!(!unit.source.contains("#define ADD"));
        assert!(unit
            .source
            .contains("int __macroprobe_const_FLAG_C = __builtin_constant_p(FLAG_C);"));
        assert!(unit.source.contains(
            "long long __macroprobe_value_FLAG_C = __builtin_choose_expr(__builtin_constant_p(FLAG_C), (long long)(FLAG_C), (-9223372036854775807LL));"
        ));

        let lines: Vec<&str> = unit.source.lines().collect();
        for span in &unit.fragments {
            let first = lines[span.first_line as usize - 1];
            let last = lines[span.last_line as usize - 1];
            assert!(first.starts_with(&format!("/* {} @", span.macro_name)));
            assert_eq!(last, "#pragma clang diagnostic pop");
        }
        assert_eq!(unit.fragments[1].first_line, unit.fragments[0].last_line + 1);
        assert_eq!(unit.macro_names().collect::<Vec<_>>(), vec!["FLAG_C", "ALIAS"]);
    }

    #[test]
    fn test_preamble_carries_only_reachable_definitions() {
        let ctx = ProbeContext::new(
            vec![
                def("GOOD_A", "1"),
                def("GOOD_B", "(GOOD_A + 1)"),
                MacroDefinition::function_like("STR", vec!["x".into()], "#y", Location::new("t.h", 4)),
            ],
            Vec::new(),
            Vec::new(),
        );
        let good_b = ctx.definitions()[1].clone();
        let names: Vec<&str> = ctx
            .referenced_definitions(&[&good_b])
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["GOOD_A", "GOOD_B"]);

        let unit = ProbeGenerator::new(0).generate(&ctx, &[&good_b], false);
        assert!(!unit.source.contains("STR"));

        let mut excluded = Exclusions::default();
        assert!(excluded.insert(&PreambleItem::Definition("GOOD_A".into())));
        assert!(!excluded.insert(&PreambleItem::Definition("GOOD_A".into())));
        let unit = ProbeGenerator::new(0).generate_excluding(&ctx, &[&good_b], false, &excluded);
        assert!(!unit.source.contains("#define GOOD_A"));
        assert!(unit.source.contains("#define GOOD_B (GOOD_A + 1)"));
    }

    #[test]
    fn test_definitions_precede_declarations() {
        let ctx = ProbeContext::new(
            vec![def("N", "4"), def("TSIZE", "sizeof(table)")],
            vec![decl(DeclarationKind::Variable, "table", "extern int table[N];")],
            Vec::new(),
        );
        let tsize = ctx.definitions()[1].clone();
        let unit = ProbeGenerator::new(0).generate(&ctx, &[&tsize], false);

        let position = |needle: &str| unit.source.find(needle).unwrap();
        assert!(position("#define N 4") < position("extern int table[N];"));
        assert!(position("#define TSIZE sizeof(table)") < position("extern int table[N];"));

        let items: Vec<&PreambleItem> = unit.preamble.entries.iter().map(|e| &e.item).collect();
        assert_eq!(
            items,
            vec![
                &PreambleItem::Definition("N".into()),
                &PreambleItem::Definition("TSIZE".into()),
                &PreambleItem::Declaration(0),
            ]
        );
    }

    #[test]
    fn test_blame_preamble_entry() {
        let ctx = ProbeContext::new(
            vec![
                def("GOOD_A", "1"),
                def("USES_STR", "STR(1)"),
                MacroDefinition::function_like("STR", vec!["x".into()], "#y", Location::new("t.h", 4)),
            ],
            Vec::new(),
            Vec::new(),
        );
        let good_a = ctx.definitions()[0].clone();
        let uses_str = ctx.definitions()[1].clone();
        let unit = ProbeGenerator::new(0).generate(&ctx, &[&good_a, &uses_str], false);

        let lines: Vec<&str> = unit.source.lines().collect();
        let define_line = lines.iter().position(|l| l.starts_with("#define STR(")).unwrap() as u32 + 1;
        let blame = unit.blame(&format!(
            "{}:{}:20: error: '#' is not followed by a macro parameter\n",
            UNIT_FILE_NAME, define_line
        ));

        assert!(!blame.in_preamble);
        assert!(!blame.is_local());
        assert_eq!(blame.entries.len(), 1);
        assert!(blame.entries[&PreambleItem::Definition("STR".into())].contains("macro parameter"));
    }

    #[test]
    fn test_empty_body_fragment() {
        let ctx = ProbeContext::new(vec![def("GUARD_H", "")], Vec::new(), Vec::new());
        let guard = ctx.definitions()[0].clone();
        let unit = ProbeGenerator::new(0).generate(&ctx, &[&guard], false);
        assert!(unit.source.contains("int __macroprobe_const_GUARD_H = 1;"));
        assert!(unit.source.contains("long long __macroprobe_value_GUARD_H = 1LL;"));
        assert_eq!(unit.preamble.include_lines, None);
    }

    #[test]
    fn test_blame_fragment_and_preamble() {
        let ctx = context();
        let generator = ProbeGenerator::new(-1);
        let flag_c = ctx.definitions()[2].clone();
        let alias = ctx.definitions()[4].clone();
        let unit = generator.generate(&ctx, &[&flag_c, &alias], true);
        let alias_line = unit.fragments[1].first_line + 8;

        let output = format!(
            "/tmp/x/{f}:{l}:40: error: use of undeclared identifier 'GLOBAL_VAR'\n/tmp/x/{f}:{l}:1: note: expanded from here\n/tmp/x/{f}:{w}:3: warning: unused\n1 error generated.\n",
            f = UNIT_FILE_NAME,
            l = alias_line,
            w = unit.fragments[0].first_line + 1,
        );
        let blame = unit.blame(&output);
        assert!(blame.is_local());
        assert_eq!(blame.fragments.len(), 1);
        assert!(blame.fragments["ALIAS"].contains("undeclared identifier"));
        assert!(blame.fragments["ALIAS"].contains("note: expanded from here"));

        let blame = unit.blame(&format!(
            "{}:2:10: fatal error: 'stdint.h' file not found\n",
            UNIT_FILE_NAME
        ));
        assert!(blame.in_preamble && blame.in_includes);
        assert!(!blame.is_local());

        let blame = unit.blame("clang: error: unable to execute command\n");
        assert!(blame.unattributed);

        let blame = unit.blame("/usr/include/foo.h:3:1: error: unknown type name 'x'\n");
        assert!(blame.in_preamble && blame.in_includes);
    }
}
