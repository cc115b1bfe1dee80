//! Record assembly
//!
//! Applies every mapping of a source to its parsed document and produces one
//! flat record per selected item.

use rayon::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::Mapping;
use crate::field::{is_required, map_field};
use crate::libxml2::XmlDocument;
use crate::loader::LoadedSource;
use crate::namespace::ScopeOrder;
use crate::reporter::Reporter;
use crate::selector::select_items;

/// One item converted into typed field values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub type_name: String,
    /// Field values in the mapping's declaration order
    pub props: Map<String, Value>,
}

/// Non-fatal problems found while assembling records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyWarning {
    #[error("source \"{url}\" item {index} property {key} value is required but was found empty")]
    RequiredFieldMissing {
        url: String,
        /// 1-based position of the item within its mapping
        index: usize,
        key: String,
    },

    #[error("source \"{url}\" item selector for type {type_name} could not be evaluated: {details}")]
    SelectorFailed {
        url: String,
        type_name: String,
        details: String,
    },
}

/// Build the records of one document
///
/// Records come out in mapping order, then item order. A required field that
/// resolves to null is reported through `warn` and left out of its record;
/// the record itself is still produced.
pub fn assemble(
    document: &XmlDocument,
    url: &str,
    mappings: &[Mapping],
    order: ScopeOrder,
    warn: &mut dyn FnMut(AssemblyWarning),
) -> Vec<Record> {
    let mut records = Vec::new();

    for mapping in mappings {
        let items = match select_items(document, &mapping.item_selector, order) {
            Ok(items) => items,
            Err(e) => {
                warn(AssemblyWarning::SelectorFailed {
                    url: url.to_string(),
                    type_name: mapping.type_name.clone(),
                    details: e.to_string(),
                });
                continue;
            }
        };

        for (position, item) in items.into_iter().enumerate() {
            let mut props = Map::new();

            for (key, field) in &mapping.item_props {
                match map_field(field, item, order) {
                    None if is_required(&field.schema_type) => {
                        warn(AssemblyWarning::RequiredFieldMissing {
                            url: url.to_string(),
                            index: position + 1,
                            key: key.clone(),
                        });
                    }
                    value => {
                        props.insert(key.clone(), value.unwrap_or(Value::Null));
                    }
                }
            }

            records.push(Record {
                type_name: mapping.type_name.clone(),
                props,
            });
        }
    }

    records
}

/// Assemble every loaded source, one rayon task per document
///
/// Records and warnings both keep source order. Warnings are held per
/// document and reported once every task has finished.
pub fn assemble_sources(
    sources: Vec<LoadedSource>,
    order: ScopeOrder,
    reporter: &dyn Reporter,
) -> Vec<Record> {
    let assembled: Vec<(Vec<Record>, Vec<AssemblyWarning>)> = sources
        .into_par_iter()
        .map(|source| {
            let mut warnings = Vec::new();
            let records = assemble(
                &source.document,
                &source.url,
                &source.mappings,
                order,
                &mut |warning| warnings.push(warning),
            );
            (records, warnings)
        })
        .collect();

    let mut records = Vec::new();
    for (source_records, warnings) in assembled {
        for warning in warnings {
            reporter.warn(&warning.to_string());
        }
        records.extend(source_records);
    }
    records
}
