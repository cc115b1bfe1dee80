//! LibXML2 FFI Wrapper Module
//!
//! Safe wrappers around the small slice of libxml2 this crate needs: parsing a
//! document from memory, walking element ancestry and namespace declarations,
//! and evaluating XPath 1.0 expressions against a context node.
//!
//! ## Memory model
//!
//! - [`XmlDocument`] owns the `xmlDoc` and frees it on drop.
//! - [`XmlNodeRef`] borrows the document, so a node can never outlive its tree.
//! - [`XPathContext`] owns an `xmlXPathContext` bound to one document.
//!
//! A document may move between threads (`Send`) but is not shared (`!Sync`):
//! libxml2 allows concurrent work on *different* documents, which is how the
//! assembler parallelizes.

use std::ffi::{CStr, CString};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Once;

use libc::{c_char, c_int, c_ushort, c_void};

use crate::error::{XmlError, XmlResult};

/// Global initialization flag for libxml2
///
/// libxml2's initialization functions are NOT thread-safe, so they run
/// exactly once behind `std::sync::Once`.
static LIBXML2_INIT: Once = Once::new();

const XML_ELEMENT_NODE: c_int = 1;
const XML_NAMESPACE_DECL: c_int = 18;

const XPATH_NODESET: c_int = 1;
const XPATH_BOOLEAN: c_int = 2;
const XPATH_NUMBER: c_int = 3;
const XPATH_STRING: c_int = 4;

/// `XML_PARSE_NONET`: never touch the network while parsing
const XML_PARSE_NONET: c_int = 1 << 11;
/// `XML_PARSE_IGNORE_ENC`: ignore the encoding named in the XML declaration
const XML_PARSE_IGNORE_ENC: c_int = 1 << 21;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlXPathContext {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlXPathCompExpr {
    _private: [u8; 0],
}

/// Layout of libxml2's `xmlNode`
///
/// `_private` through `doc` are shared with `xmlAttr` and `xmlDoc`; `ns_def`
/// only exists on element nodes and must not be read for any other type.
#[repr(C)]
#[allow(dead_code)]
pub struct XmlNode {
    _private: *mut c_void,
    node_type: c_int,
    name: *const c_char,
    children: *mut XmlNode,
    last: *mut XmlNode,
    parent: *mut XmlNode,
    next: *mut XmlNode,
    prev: *mut XmlNode,
    doc: *mut XmlDoc,
    ns: *mut XmlNs,
    content: *mut c_char,
    properties: *mut c_void,
    ns_def: *mut XmlNs,
    psvi: *mut c_void,
    line: c_ushort,
    extra: c_ushort,
}

/// Layout of libxml2's `xmlNs`
#[repr(C)]
#[allow(dead_code)]
pub struct XmlNs {
    next: *mut XmlNs,
    ns_type: c_int,
    href: *const c_char,
    prefix: *const c_char,
    _private: *mut c_void,
    context: *mut XmlDoc,
}

#[repr(C)]
struct XmlNodeSet {
    node_nr: c_int,
    node_max: c_int,
    node_tab: *mut *mut XmlNode,
}

#[repr(C)]
#[allow(dead_code)]
struct XmlXPathObject {
    object_type: c_int,
    nodesetval: *mut XmlNodeSet,
    boolval: c_int,
    floatval: f64,
    stringval: *mut c_char,
    user: *mut c_void,
    index: c_int,
    user2: *mut c_void,
    index2: c_int,
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    // Document parsing
    fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    fn xmlFreeDoc(doc: *mut XmlDoc);
    fn xmlDocGetRootElement(doc: *const XmlDoc) -> *mut XmlNode;

    // Error capture (thread-local in libxml2)
    fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);

    // XPath
    fn xmlXPathNewContext(doc: *mut XmlDoc) -> *mut XmlXPathContext;
    fn xmlXPathFreeContext(ctxt: *mut XmlXPathContext);
    fn xmlXPathRegisterNs(
        ctxt: *mut XmlXPathContext,
        prefix: *const c_char,
        ns_uri: *const c_char,
    ) -> c_int;
    fn xmlXPathNodeEval(
        node: *mut XmlNode,
        expression: *const c_char,
        ctxt: *mut XmlXPathContext,
    ) -> *mut XmlXPathObject;
    fn xmlXPathFreeObject(obj: *mut XmlXPathObject);
    fn xmlXPathCompile(expression: *const c_char) -> *mut XmlXPathCompExpr;
    fn xmlXPathFreeCompExpr(comp: *mut XmlXPathCompExpr);
}

/// Callback for libxml2 to report errors (structured)
unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *mut xmlError) {
    let errors = unsafe { &mut *(user_data as *mut Vec<String>) };

    if !error.is_null() {
        let msg_ptr = unsafe { (*error).message };
        if !msg_ptr.is_null() {
            let c_str = unsafe { CStr::from_ptr(msg_ptr) };
            if let Ok(s) = c_str.to_str() {
                errors.push(s.trim().to_string());
            }
        }
    }
}

/// Routes libxml2 diagnostics on the current thread into a vector until dropped
struct ErrorCapture;

impl ErrorCapture {
    fn install(errors: &mut Vec<String>) -> Self {
        let errors_ptr = errors as *mut Vec<String> as *mut c_void;
        unsafe {
            xmlSetStructuredErrorFunc(errors_ptr, Some(structured_error_callback));
        }
        ErrorCapture
    }
}

impl Drop for ErrorCapture {
    fn drop(&mut self) {
        unsafe {
            xmlSetStructuredErrorFunc(std::ptr::null_mut(), None);
        }
    }
}

fn with_captured_errors<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let mut errors = Vec::new();
    let result = {
        let _capture = ErrorCapture::install(&mut errors);
        f()
    };
    (result, errors)
}

fn first_error(errors: &[String], fallback: &str) -> String {
    errors
        .first()
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

/// Copy a libxml2 string, treating NULL as absent
unsafe fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

/// A parsed XML document with a root element
pub struct XmlDocument {
    doc: NonNull<XmlDoc>,
    root: NonNull<XmlNode>,
}

// Safety: the document is exclusively owned and libxml2 permits working on
// distinct documents from distinct threads. Not Sync.
unsafe impl Send for XmlDocument {}

impl XmlDocument {
    /// The document element
    pub fn root(&self) -> XmlNodeRef<'_> {
        XmlNodeRef {
            ptr: self.root,
            _doc: PhantomData,
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut XmlDoc {
        self.doc.as_ptr()
    }
}

impl fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlDocument")
            .field("root", &self.root().name())
            .finish()
    }
}

impl Drop for XmlDocument {
    fn drop(&mut self) {
        unsafe {
            xmlFreeDoc(self.doc.as_ptr());
        }
    }
}

/// A prefix declaration found on a single element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDeclaration {
    /// `None` for a default namespace declaration (`xmlns="..."`)
    pub prefix: Option<String>,
    pub uri: String,
}

/// A node borrowed from an [`XmlDocument`]
#[derive(Clone, Copy)]
pub struct XmlNodeRef<'doc> {
    ptr: NonNull<XmlNode>,
    _doc: PhantomData<&'doc XmlDocument>,
}

impl<'doc> XmlNodeRef<'doc> {
    fn node_type(&self) -> c_int {
        unsafe { (*self.ptr.as_ptr()).node_type }
    }

    pub fn is_element(&self) -> bool {
        self.node_type() == XML_ELEMENT_NODE
    }

    /// Local name of the node, if it has one
    pub fn name(&self) -> Option<String> {
        if self.node_type() == XML_NAMESPACE_DECL {
            return None;
        }
        unsafe { owned_string((*self.ptr.as_ptr()).name) }
    }

    /// The nearest enclosing element; `None` at the document element
    pub fn parent_element(&self) -> Option<XmlNodeRef<'doc>> {
        if self.node_type() == XML_NAMESPACE_DECL {
            return None;
        }

        let parent = unsafe { (*self.ptr.as_ptr()).parent };
        let parent = NonNull::new(parent)?;
        let parent = XmlNodeRef {
            ptr: parent,
            _doc: PhantomData,
        };

        parent.is_element().then_some(parent)
    }

    /// Namespace declarations made on this node itself, in source order
    pub fn namespace_declarations(&self) -> Vec<NamespaceDeclaration> {
        let mut declarations = Vec::new();
        if !self.is_element() {
            return declarations;
        }

        let mut ns = unsafe { (*self.ptr.as_ptr()).ns_def };
        while !ns.is_null() {
            let (prefix, href, next) = unsafe { ((*ns).prefix, (*ns).href, (*ns).next) };
            if let Some(uri) = unsafe { owned_string(href) } {
                declarations.push(NamespaceDeclaration {
                    prefix: unsafe { owned_string(prefix) },
                    uri,
                });
            }
            ns = next;
        }

        declarations
    }

    /// The owning document; namespace nodes carry no back-pointer here
    fn document_ptr(&self) -> Option<NonNull<XmlDoc>> {
        if self.node_type() == XML_NAMESPACE_DECL {
            return None;
        }
        NonNull::new(unsafe { (*self.ptr.as_ptr()).doc })
    }

    pub(crate) fn as_ptr(&self) -> *mut XmlNode {
        self.ptr.as_ptr()
    }
}

impl PartialEq for XmlNodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl Eq for XmlNodeRef<'_> {}

impl fmt::Debug for XmlNodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlNodeRef")
            .field("name", &self.name())
            .field("type", &self.node_type())
            .finish()
    }
}

/// Owned XPath result object
struct XPathObject {
    ptr: NonNull<XmlXPathObject>,
}

impl Drop for XPathObject {
    fn drop(&mut self) {
        unsafe {
            xmlXPathFreeObject(self.ptr.as_ptr());
        }
    }
}

/// XPath evaluation context bound to one document
pub struct XPathContext<'doc> {
    ptr: NonNull<XmlXPathContext>,
    _doc: PhantomData<&'doc XmlDocument>,
}

impl<'doc> XPathContext<'doc> {
    pub fn new(document: &'doc XmlDocument) -> XmlResult<Self> {
        let ptr = unsafe { xmlXPathNewContext(document.as_ptr()) };
        let ptr = NonNull::new(ptr).ok_or(XmlError::ContextCreationFailed)?;

        Ok(Self {
            ptr,
            _doc: PhantomData,
        })
    }

    /// Create a context for the document that owns `node`
    pub fn for_node(node: XmlNodeRef<'doc>) -> XmlResult<Self> {
        let doc = node.document_ptr().ok_or(XmlError::ContextCreationFailed)?;
        let ptr = unsafe { xmlXPathNewContext(doc.as_ptr()) };
        let ptr = NonNull::new(ptr).ok_or(XmlError::ContextCreationFailed)?;

        Ok(Self {
            ptr,
            _doc: PhantomData,
        })
    }

    /// Bind `prefix` for subsequent evaluations (libxml2 copies both strings)
    pub fn register_namespace(&mut self, prefix: &str, uri: &str) -> XmlResult<()> {
        let c_prefix = CString::new(prefix).map_err(|_| XmlError::InteriorNul)?;
        let c_uri = CString::new(uri).map_err(|_| XmlError::InteriorNul)?;

        let rc = unsafe { xmlXPathRegisterNs(self.ptr.as_ptr(), c_prefix.as_ptr(), c_uri.as_ptr()) };
        if rc != 0 {
            return Err(XmlError::NamespaceRegistration {
                prefix: prefix.to_string(),
            });
        }
        Ok(())
    }

    fn evaluate(&mut self, node: XmlNodeRef<'doc>, expression: &str) -> XmlResult<XPathObject> {
        let c_expr = CString::new(expression).map_err(|_| XmlError::InteriorNul)?;

        let (ptr, errors) = with_captured_errors(|| unsafe {
            xmlXPathNodeEval(node.as_ptr(), c_expr.as_ptr(), self.ptr.as_ptr())
        });

        NonNull::new(ptr)
            .map(|ptr| XPathObject { ptr })
            .ok_or_else(|| XmlError::EvaluationFailed {
                expression: expression.to_string(),
                details: first_error(&errors, "no result produced"),
            })
    }

    /// Evaluate `expression` and return the matched nodes in document order
    ///
    /// A result that is not a node-set yields no nodes. Namespace nodes are
    /// left out: libxml2 hands them out as copies owned by the result object,
    /// which is freed before this returns.
    pub fn select_nodes(
        &mut self,
        node: XmlNodeRef<'doc>,
        expression: &str,
    ) -> XmlResult<Vec<XmlNodeRef<'doc>>> {
        let object = self.evaluate(node, expression)?;
        let raw = unsafe { &*object.ptr.as_ptr() };

        if raw.object_type != XPATH_NODESET || raw.nodesetval.is_null() {
            return Ok(Vec::new());
        }

        let set = unsafe { &*raw.nodesetval };
        if set.node_nr <= 0 || set.node_tab.is_null() {
            return Ok(Vec::new());
        }

        let tab = unsafe { std::slice::from_raw_parts(set.node_tab, set.node_nr as usize) };
        Ok(tab
            .iter()
            .filter_map(|&ptr| NonNull::new(ptr))
            .map(|ptr| XmlNodeRef {
                ptr,
                _doc: PhantomData,
            })
            .filter(|node| node.node_type() != XML_NAMESPACE_DECL)
            .collect())
    }

    /// Evaluate an expression producing a string, number or boolean
    pub fn evaluate_string(&mut self, node: XmlNodeRef<'doc>, expression: &str) -> XmlResult<String> {
        let object = self.evaluate(node, expression)?;
        let raw = unsafe { &*object.ptr.as_ptr() };

        match raw.object_type {
            XPATH_STRING => Ok(unsafe { owned_string(raw.stringval) }.unwrap_or_default()),
            XPATH_NUMBER => Ok(format_xpath_number(raw.floatval)),
            XPATH_BOOLEAN => Ok(if raw.boolval != 0 { "true" } else { "false" }.to_string()),
            other => Err(XmlError::EvaluationFailed {
                expression: expression.to_string(),
                details: format!("expected a string value, got XPath object type {}", other),
            }),
        }
    }
}

impl Drop for XPathContext<'_> {
    fn drop(&mut self) {
        unsafe {
            xmlXPathFreeContext(self.ptr.as_ptr());
        }
    }
}

/// XPath 1.0 number-to-string conversion
fn format_xpath_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// LibXML2 wrapper providing safe access to parsing and XPath compilation
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    /// Create a new wrapper, initializing libxml2 on first use
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Parse raw document text into a tree
    ///
    /// The text is already decoded, so it is always read as UTF-8 whatever
    /// the XML declaration says.
    ///
    /// # Errors
    ///
    /// Returns `XmlError::ParseFailed` when libxml2 produces no tree (any
    /// well-formedness error), carrying the first parser diagnostic, and
    /// `XmlError::NoRootElement` when the tree has no document element.
    pub fn parse_document(&self, text: &str) -> XmlResult<XmlDocument> {
        let size = c_int::try_from(text.len())
            .map_err(|_| XmlError::InputTooLarge { size: text.len() })?;

        let (doc, errors) = with_captured_errors(|| unsafe {
            xmlReadMemory(
                text.as_ptr() as *const c_char,
                size,
                std::ptr::null(),
                c"UTF-8".as_ptr(),
                XML_PARSE_NONET | XML_PARSE_IGNORE_ENC,
            )
        });

        let doc = NonNull::new(doc).ok_or_else(|| XmlError::ParseFailed {
            details: first_error(&errors, "no document produced"),
        })?;

        let root = unsafe { xmlDocGetRootElement(doc.as_ptr()) };
        match NonNull::new(root) {
            Some(root) => Ok(XmlDocument { doc, root }),
            None => {
                unsafe { xmlFreeDoc(doc.as_ptr()) };
                Err(XmlError::NoRootElement)
            }
        }
    }

    /// Check that `expression` is syntactically valid XPath
    ///
    /// Prefix bindings are not checked; they depend on the document.
    pub fn compile_expression(&self, expression: &str) -> XmlResult<()> {
        let c_expr = CString::new(expression).map_err(|_| XmlError::InteriorNul)?;

        let (comp, _errors) = with_captured_errors(|| unsafe { xmlXPathCompile(c_expr.as_ptr()) });
        if comp.is_null() {
            return Err(XmlError::InvalidExpression {
                expression: expression.to_string(),
            });
        }

        unsafe { xmlXPathFreeCompExpr(comp) };
        Ok(())
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}
