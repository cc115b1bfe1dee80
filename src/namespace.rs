//! Namespace scope resolution
//!
//! libxml2 only knows about the declarations made on each element. Before an
//! XPath expression that uses prefixes can be evaluated at a node, every
//! binding visible at that node has to be collected from the node and its
//! ancestors and registered on the XPath context.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::libxml2::XmlNodeRef;

/// Effective prefix → URI bindings at a node
pub type NamespaceMap = IndexMap<String, String>;

/// Which declaration wins when a prefix is bound at several levels
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ScopeOrder {
    /// The declaration closest to the node wins (standard XML scoping)
    #[default]
    #[serde(rename = "nearest")]
    #[value(name = "nearest")]
    NearestWins,
    /// The outermost ancestor's declaration wins. Matches the behavior of
    /// earlier releases, which merged ancestor scopes over the node's own.
    #[serde(rename = "outermost")]
    #[value(name = "outermost")]
    OutermostWins,
}

impl ScopeOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nearest" => Some(ScopeOrder::NearestWins),
            "outermost" => Some(ScopeOrder::OutermostWins),
            _ => None,
        }
    }
}

/// Collect the prefix bindings visible at `node`
///
/// Starts from the node's own declarations and merges in every ancestor
/// element's declarations up to the document element. Default namespace
/// declarations are skipped: XPath 1.0 cannot address them by prefix.
pub fn resolve_namespaces(node: XmlNodeRef<'_>, order: ScopeOrder) -> NamespaceMap {
    let mut namespaces = NamespaceMap::new();

    let mut current = Some(node);
    while let Some(scope) = current {
        for declaration in scope.namespace_declarations() {
            let Some(prefix) = declaration.prefix else {
                continue;
            };

            match order {
                ScopeOrder::NearestWins => {
                    namespaces.entry(prefix).or_insert(declaration.uri);
                }
                ScopeOrder::OutermostWins => {
                    namespaces.insert(prefix, declaration.uri);
                }
            }
        }
        current = scope.parent_element();
    }

    namespaces
}
