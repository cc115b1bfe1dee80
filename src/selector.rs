//! Item selection
//!
//! Runs a mapping's item selector against the document element and returns
//! the matched nodes. Prefixes in the selector resolve against the bindings
//! visible at the document element.

use crate::error::XmlResult;
use crate::libxml2::{XPathContext, XmlDocument, XmlNodeRef};
use crate::namespace::{ScopeOrder, resolve_namespaces};

/// A node matched by a mapping's item selector
pub type Item<'doc> = XmlNodeRef<'doc>;

/// Build an XPath context with every binding visible at `node` registered
pub(crate) fn scoped_context<'doc>(
    node: XmlNodeRef<'doc>,
    order: ScopeOrder,
) -> XmlResult<XPathContext<'doc>> {
    let mut context = XPathContext::for_node(node)?;
    for (prefix, uri) in resolve_namespaces(node, order) {
        context.register_namespace(&prefix, &uri)?;
    }
    Ok(context)
}

/// Select the items for one mapping, in document order
///
/// No match is an empty vector, not an error. An expression libxml2 cannot
/// evaluate (e.g. an unbound prefix) is an error.
pub fn select_items<'doc>(
    document: &'doc XmlDocument,
    item_selector: &str,
    order: ScopeOrder,
) -> XmlResult<Vec<Item<'doc>>> {
    let root = document.root();
    let mut context = scoped_context(root, order)?;
    context.select_nodes(root, item_selector)
}
