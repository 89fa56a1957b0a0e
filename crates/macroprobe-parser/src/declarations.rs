//! Top-level declaration harvesting
//!
//! Uses tree-sitter to find the declarations a probe unit may need in order
//! to compile a macro body: `extern` variables, prototypes, typedefs and
//! struct/union/enum definitions (enumerator names included).

use macroprobe_core::{Declaration, DeclarationKind, Error, Location, Result};
use tree_sitter::{Node, Parser};
use tracing::debug;

/// Collects top-level declarations from C header text
pub struct DeclarationCollector {
    parser: Parser,
}

impl DeclarationCollector {
    /// Create a collector for C
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .map_err(|e| Error::Parse(format!("Failed to load C grammar: {}", e)))?;
        Ok(Self { parser })
    }

    /// Collect declarations in source order. Declarations tree-sitter could
    /// not parse cleanly are dropped.
    pub fn collect(&mut self, source: &str, file: &str) -> Vec<Declaration> {
        let Some(tree) = self.parser.parse(source, None) else {
            return Vec::new();
        };

        let mut declarations = Vec::new();
        self.visit_items(tree.root_node(), source, file, &mut declarations);
        declarations
    }

    fn visit_items(&self, node: Node, source: &str, file: &str, out: &mut Vec<Declaration>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "declaration" | "type_definition" => {
                    if let Some(decl) = self.extract_declaration(child, source, file) {
                        debug!("Found declaration of {:?}", decl.names);
                        out.push(decl);
                    }
                }
                "struct_specifier" | "union_specifier" | "enum_specifier" => {
                    if let Some(decl) = self.extract_tag(child, source, file) {
                        debug!("Found tag definition {:?}", decl.names);
                        out.push(decl);
                    }
                }
                // Conditional blocks are taken verbatim, like the directive scanner does
                "preproc_ifdef" | "preproc_if" | "preproc_else" | "preproc_elif"
                | "preproc_elifdef" | "linkage_specification" | "declaration_list" => {
                    self.visit_items(child, source, file, out);
                }
                _ => {}
            }
        }
    }

    fn extract_declaration(&self, node: Node, source: &str, file: &str) -> Option<Declaration> {
        if node.has_error() {
            return None;
        }

        let mut names = Vec::new();
        let mut is_function = false;
        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            if declares_function(declarator) {
                is_function = true;
            }
            if let Some(name) = self.declarator_name(declarator, source) {
                names.push(name);
            }
        }

        let declares_objects = !names.is_empty();
        if let Some(ty) = node.child_by_field_name("type") {
            names.extend(self.tag_names(ty, source));
        }

        if names.is_empty() {
            return None;
        }

        let kind = if node.kind() == "type_definition" {
            DeclarationKind::Typedef
        } else if !declares_objects {
            DeclarationKind::Tag
        } else if is_function {
            DeclarationKind::Function
        } else {
            DeclarationKind::Variable
        };

        Some(Declaration {
            kind,
            names,
            text: self.statement_text(node, source)?,
            location: location_of(node, file),
        })
    }

    fn extract_tag(&self, node: Node, source: &str, file: &str) -> Option<Declaration> {
        if node.has_error() || node.child_by_field_name("body").is_none() {
            return None;
        }
        let names = self.tag_names(node, source);
        if names.is_empty() {
            return None;
        }

        Some(Declaration {
            kind: DeclarationKind::Tag,
            names,
            text: self.statement_text(node, source)?,
            location: location_of(node, file),
        })
    }

    /// Tag name and enumerators of a struct/union/enum specifier with a body
    fn tag_names(&self, node: Node, source: &str) -> Vec<String> {
        let mut names = Vec::new();
        if !matches!(node.kind(), "struct_specifier" | "union_specifier" | "enum_specifier") {
            return names;
        }
        let Some(body) = node.child_by_field_name("body") else {
            return names;
        };

        if let Some(name) = node.child_by_field_name("name") {
            names.push(self.node_text(name, source));
        }

        if body.kind() == "enumerator_list" {
            let mut cursor = body.walk();
            for enumerator in body.named_children(&mut cursor) {
                if enumerator.kind() != "enumerator" {
                    continue;
                }
                if let Some(name) = enumerator.child_by_field_name("name") {
                    names.push(self.node_text(name, source));
                }
            }
        }

        names
    }

    fn declarator_name(&self, node: Node, source: &str) -> Option<String> {
        match node.kind() {
            "identifier" | "type_identifier" | "primitive_type" => Some(self.node_text(node, source)),
            _ => {
                if let Some(inner) = node.child_by_field_name("declarator") {
                    return self.declarator_name(inner, source);
                }
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .find_map(|child| self.declarator_name(child, source));
                found
            }
        }
    }

    fn statement_text(&self, node: Node, source: &str) -> Option<String> {
        let text = node.utf8_text(source.as_bytes()).ok()?.trim();
        if text.ends_with(';') {
            Some(text.to_string())
        } else {
            Some(format!("{};", text))
        }
    }

    fn node_text(&self, node: Node, source: &str) -> String {
        node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
    }
}

fn declares_function(node: Node) -> bool {
    match node.kind() {
        // `(*name)(...)` declares a pointer to a function
        "function_declarator" => !node
            .child_by_field_name("declarator")
            .is_some_and(|inner| inner.kind() == "parenthesized_declarator"),
        "pointer_declarator" | "init_declarator" | "array_declarator" | "attributed_declarator" => node
            .child_by_field_name("declarator")
            .or_else(|| node.named_child(0))
            .is_some_and(declares_function),
        _ => false,
    }
}

fn location_of(node: Node, file: &str) -> Location {
    Location::new(file, node.start_position().row as u32 + 1)
}
