//! LLVM IR artifact reading
//!
//! Only the integer globals a probe unit defines are of interest. Their
//! initializers are either plain integers or constant expressions over
//! addresses, which have no value until link time.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static GLOBAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@([A-Za-z_.$][\w.$]*) = (?:[a-z_]+ )*?(?:global|constant) i\d+ (.+?)(?:, align \d+)?$")
        .expect("global regex is valid")
});

/// Initializer of an integer global
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrInitializer {
    Integer(i64),
    /// `ptrtoint`, `getelementptr` or a symbol reference
    AddressDerived(String),
    /// Anything else the IR printer produced
    Other(String),
}

impl IrInitializer {
    fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Ok(value) = text.parse::<i64>() {
            return IrInitializer::Integer(value);
        }
        // i1 globals print as `true` / `false`
        match text {
            "true" => return IrInitializer::Integer(1),
            "false" | "zeroinitializer" => return IrInitializer::Integer(0),
            _ => {}
        }
        if text.contains("ptrtoint") || text.contains("getelementptr") || text.contains('@') {
            IrInitializer::AddressDerived(text.to_string())
        } else {
            IrInitializer::Other(text.to_string())
        }
    }
}

/// Integer globals whose names start with `prefix`, keyed by name
pub fn read_globals(ir: &str, prefix: &str) -> HashMap<String, IrInitializer> {
    ir.lines()
        .filter(|line| line.starts_with('@'))
        .filter_map(|line| GLOBAL_RE.captures(line))
        .filter(|caps| caps[1].starts_with(prefix))
        .map(|caps| (caps[1].to_string(), IrInitializer::parse(&caps[2])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const IR: &str = r#"; ModuleID = 'macroprobe_unit.c'
source_filename = "macroprobe_unit.c"
target triple = "x86_64-unknown-linux-gnu"

@.str = private unnamed_addr constant [12 x i8] c"Hello World\00", align 1
@__macroprobe_const_FLAG_C = dso_local global i32 1, align 4
@__macroprobe_value_FLAG_C = dso_local global i64 3, align 8
@__macroprobe_value_ERROR_CODE = dso_local global i64 -1, align 8
@__macroprobe_value_INV_STRING = dso_local global i64 ptrtoint (ptr @.str to i64), align 8
@__macroprobe_value_INV_PTR = global i64 ptrtoint (ptr @GLOBAL_VAR to i64), align 8
@GLOBAL_VAR = external global i32, align 4
"#;

    #[test]
    fn test_read_globals() {
        let globals = read_globals(IR, "__macroprobe_");
        assert_eq!(globals.len(), 5);
        assert_eq!(globals["__macroprobe_const_FLAG_C"], IrInitializer::Integer(1));
        assert_eq!(globals["__macroprobe_value_FLAG_C"], IrInitializer::Integer(3));
        assert_eq!(globals["__macroprobe_value_ERROR_CODE"], IrInitializer::Integer(-1));
        assert_eq!(
            globals["__macroprobe_value_INV_STRING"],
            IrInitializer::AddressDerived("ptrtoint (ptr @.str to i64)".into())
        );
        assert!(matches!(
            globals["__macroprobe_value_INV_PTR"],
            IrInitializer::AddressDerived(_)
        ));
    }

    #[test]
    fn test_extreme_values() {
        let ir = "@__macroprobe_value_MIN = dso_local global i64 -9223372036854775808, align 8\n@__macroprobe_value_MAX = dso_local global i64 9223372036854775807, align 8\n";
        let globals = read_globals(ir, "__macroprobe_value_");
        assert_eq!(globals["__macroprobe_value_MIN"], IrInitializer::Integer(i64::MIN));
        assert_eq!(globals["__macroprobe_value_MAX"], IrInitializer::Integer(i64::MAX));
    }
}
