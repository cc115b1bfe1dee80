//! Type declarations derived from the configured mappings

use crate::config::{Mapping, Source, filter_sources};

/// Interface every generated type implements
pub const NODE_INTERFACE: &str = "Node";

/// Declaration for one mapping
///
/// `type <Name> implements Node { <clauses> }`, one clause per field in
/// declaration order, clauses joined by a newline.
pub fn type_declaration(mapping: &Mapping) -> String {
    let clauses = mapping
        .item_props
        .iter()
        .map(|(key, field)| {
            format!(
                "{}: {} {}",
                key,
                field.schema_type,
                field.schema_directive.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "type {} implements {} {{ {} }}",
        mapping.type_name, NODE_INTERFACE, clauses
    )
}

/// One declaration per mapping of every usable source
///
/// Mappings sharing a type name each produce their own declaration.
pub fn generate_type_declarations(sources: &[Source]) -> Vec<String> {
    filter_sources(sources)
        .into_iter()
        .flat_map(|source| source.mappings.iter().map(type_declaration))
        .collect()
}
