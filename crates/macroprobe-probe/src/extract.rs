//! Probe result interpretation

use macroprobe_core::{Annotation, MacroCategory, MacroDefinition, ProbeResult};
use std::collections::HashMap;

use crate::artifact::IrInitializer;
use crate::generator::{flag_symbol, value_symbol};

/// Turn the globals of a successfully compiled unit into the result for
/// one probed macro.
///
/// The constancy flag decides. When the flag is missing from the artifact
/// the sentinel is used instead, which misreports a constant that happens
/// to equal the sentinel; such results carry [`Annotation::SentinelFallback`].
pub fn interpret(
    definition: &MacroDefinition,
    category: MacroCategory,
    globals: &HashMap<String, IrInitializer>,
    sentinel: i64,
) -> ProbeResult {
    let name = definition.name.as_str();
    let flag = globals.get(&flag_symbol(name));
    let value = globals.get(&value_symbol(name));

    let mut result = match (flag, value) {
        (_, None) => ProbeResult::compile_error(
            name,
            category,
            format!("{} missing from compiler output", value_symbol(name)),
        ),
        (Some(IrInitializer::Integer(0)), Some(_)) => ProbeResult::non_constant(name, category),
        (Some(_), Some(IrInitializer::Integer(v))) => ProbeResult::constant(name, *v, category),
        (Some(_), Some(IrInitializer::AddressDerived(_))) => {
            ProbeResult::address_derived(name, category)
        }
        (Some(_), Some(IrInitializer::Other(text))) => ProbeResult::compile_error(
            name,
            category,
            format!("unrecognized initializer for {}: {}", value_symbol(name), text),
        ),
        (None, Some(IrInitializer::Integer(v))) if *v == sentinel => {
            ProbeResult::non_constant(name, category).with_annotation(Annotation::SentinelFallback)
        }
        (None, Some(IrInitializer::Integer(v))) => {
            ProbeResult::constant(name, *v, category).with_annotation(Annotation::SentinelFallback)
        }
        (None, Some(IrInitializer::AddressDerived(_))) => {
            ProbeResult::address_derived(name, category)
                .with_annotation(Annotation::SentinelFallback)
        }
        (None, Some(IrInitializer::Other(text))) => ProbeResult::compile_error(
            name,
            category,
            format!("unrecognized initializer for {}: {}", value_symbol(name), text),
        ),
    };

    if category == MacroCategory::ObviouslyNonInteger {
        result = result.with_annotation(Annotation::NonIntegerLiteral);
    }
    if definition.has_empty_body() {
        result = result.with_annotation(Annotation::EmptyBody);
    }
    result.with_location(definition.location.clone())
}
