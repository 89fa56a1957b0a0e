//! Macro Classifier
//!
//! Assigns each definition a [`MacroCategory`] from lexical inspection of
//! its replacement text. This is only a cheap filter: whether a candidate is
//! really an integer constant is decided later by the compiler.

use macroprobe_core::{Declaration, DeclarationKind, MacroCategory, MacroDefinition};
use std::collections::HashSet;

use crate::lexer::{is_float_literal, tokenize, Token};

const TYPE_KEYWORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "_Bool",
    "bool", "_Complex", "__int128", "wchar_t",
];

const QUALIFIERS: &[&str] = &["const", "volatile", "restrict", "__restrict", "_Atomic"];

const TAG_KEYWORDS: &[&str] = &["struct", "union", "enum"];

const STANDARD_TYPEDEFS: &[&str] = &[
    "size_t", "ssize_t", "ptrdiff_t", "intptr_t", "uintptr_t", "intmax_t", "uintmax_t", "int8_t",
    "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t", "off_t",
    "FILE", "va_list",
];

/// Lexical macro classifier
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    /// Typedef names known from the scanned headers
    type_names: HashSet<String>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier that also recognizes the typedefs among `declarations`
    pub fn with_declarations<'a, I>(declarations: I) -> Self
    where
        I: IntoIterator<Item = &'a Declaration>,
    {
        let mut classifier = Self::new();
        for decl in declarations {
            if decl.kind == DeclarationKind::Typedef {
                for name in &decl.names {
                    classifier.add_type_name(name.clone());
                }
            }
        }
        classifier
    }

    pub fn add_type_name(&mut self, name: impl Into<String>) {
        self.type_names.insert(name.into());
    }

    /// Assign exactly one category
    pub fn classify(&self, definition: &MacroDefinition) -> MacroCategory {
        if definition.is_function_like {
            return MacroCategory::FunctionLike;
        }

        let tokens = tokenize(&definition.body);
        if self.is_type_like(&tokens) {
            MacroCategory::UnresolvableType
        } else if is_non_integer_literal(&tokens) {
            MacroCategory::ObviouslyNonInteger
        } else {
            MacroCategory::IntegerCandidate
        }
    }

    /// Type keywords, qualifiers, tagged types and typedef names, optionally
    /// followed by `*`s, and nothing else
    fn is_type_like(&self, tokens: &[Token]) -> bool {
        let mut end = tokens.len();
        while end > 0 && tokens[end - 1].is_punct("*") {
            end -= 1;
        }
        let tokens = &tokens[..end];
        let single = tokens.len() == 1;

        let mut saw_type = false;
        let mut i = 0;
        while i < tokens.len() {
            let Token::Ident(word) = &tokens[i] else {
                return false;
            };
            let word = word.as_str();

            if QUALIFIERS.contains(&word) {
                // qualifiers alone do not make a type
            } else if TAG_KEYWORDS.contains(&word) {
                if !matches!(tokens.get(i + 1), Some(Token::Ident(_))) {
                    return false;
                }
                i += 1;
                saw_type = true;
            } else if TYPE_KEYWORDS.contains(&word)
                || STANDARD_TYPEDEFS.contains(&word)
                || self.type_names.contains(word)
                || (single && word.ends_with("_t"))
            {
                saw_type = true;
            } else {
                return false;
            }
            i += 1;
        }

        saw_type
    }
}

/// A lone string literal (adjacent literals concatenate) or floating literal
fn is_non_integer_literal(tokens: &[Token]) -> bool {
    let mut tokens = tokens;
    while tokens.len() >= 2 && tokens[0].is_punct("(") && tokens[tokens.len() - 1].is_punct(")") {
        tokens = &tokens[1..tokens.len() - 1];
    }

    if !tokens.is_empty() && tokens.iter().all(|t| matches!(t, Token::Str(_))) {
        return true;
    }

    match tokens {
        [Token::Number(n)] => is_float_literal(n),
        [sign, Token::Number(n)] if sign.is_punct("-") || sign.is_punct("+") => is_float_literal(n),
        _ => false,
    }
}
