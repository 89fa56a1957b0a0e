//! Minimal C token splitter for replacement-list inspection
//!
//! This is not a preprocessor: it only cuts text into identifiers, numbers,
//! literals and punctuators so that bodies can be inspected lexically.

/// A lexical token of a macro body or declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    /// Preprocessing number, suffixes included (`0x10UL`, `1.5e3f`)
    Number(String),
    /// String literal including quotes and encoding prefix
    Str(String),
    /// Character literal including quotes and encoding prefix
    Char(String),
    Punct(String),
}

impl Token {
    pub fn text(&self) -> &str {
        match self {
            Token::Ident(s) | Token::Number(s) | Token::Str(s) | Token::Char(s) | Token::Punct(s) => s,
        }
    }

    pub fn is_punct(&self, p: &str) -> bool {
        matches!(self, Token::Punct(s) if s == p)
    }
}

const PUNCT3: &[&str] = &["<<=", ">>=", "..."];
const PUNCT2: &[&str] = &[
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "->", "++", "--", "##", "+=", "-=", "*=",
    "/=", "%=", "&=", "|=", "^=",
];
const ENCODING_PREFIXES: &[&str] = &["L", "u", "U", "u8"];

/// Split text into tokens
pub fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if ENCODING_PREFIXES.contains(&word.as_str()) && i < chars.len() && (chars[i] == '"' || chars[i] == '\'') {
                let quote = chars[i];
                i = scan_quoted(&chars, i);
                let literal: String = chars[start..i].iter().collect();
                tokens.push(if quote == '"' { Token::Str(literal) } else { Token::Char(literal) });
            } else {
                tokens.push(Token::Ident(word));
            }
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            i += 1;
            while i < chars.len() {
                let n = chars[i];
                if n.is_ascii_alphanumeric() || n == '_' || n == '.' || n == '\'' && chars.get(i + 1).is_some_and(|d| d.is_ascii_alphanumeric()) {
                    i += 1;
                } else if (n == '+' || n == '-') && matches!(chars[i - 1], 'e' | 'E' | 'p' | 'P') {
                    i += 1;
                } else {
                    break;
                }
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
        } else if c == '"' || c == '\'' {
            let start = i;
            i = scan_quoted(&chars, i);
            let literal: String = chars[start..i].iter().collect();
            tokens.push(if c == '"' { Token::Str(literal) } else { Token::Char(literal) });
        } else {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            let punct = PUNCT3
                .iter()
                .chain(PUNCT2.iter())
                .find(|p| rest.starts_with(**p))
                .map(|p| p.to_string())
                .unwrap_or_else(|| c.to_string());
            i += punct.chars().count();
            tokens.push(Token::Punct(punct));
        }
    }

    tokens
}

/// Index just past the closing quote of the literal starting at `open`
/// (or the end of input if unterminated).
fn scan_quoted(chars: &[char], open: usize) -> usize {
    let quote = chars[open];
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

/// Identifiers appearing in the text, in order, duplicates kept
pub fn identifiers(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter_map(|t| match t {
            Token::Ident(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Whether a preprocessing number is a floating literal
pub fn is_float_literal(number: &str) -> bool {
    let lower = number.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return hex.contains('p') || hex.contains('.');
    }
    lower.contains('.') || lower.contains('e') || lower.ends_with('f')
}

/// Whether `name` is a valid C identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
