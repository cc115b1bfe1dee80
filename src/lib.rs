//! # anyxml-source Library
//!
//! Maps arbitrary XML documents onto flat, typed records. Items are picked
//! with XPath, fields are extracted and coerced per declared schema type,
//! and the same field declarations yield the type declarations of a content
//! graph. Fetching, caching and node emission are swappable collaborators.

pub mod assembler;
pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod http_client;
pub mod libxml2;
pub mod loader;
pub mod namespace;
pub mod node;
pub mod output;
pub mod reporter;
pub mod schema;
pub mod selector;

pub use assembler::{AssemblyWarning, Record, assemble, assemble_sources};
pub use cache::{
    CacheMetadata, CachedDocument, CleanupStats, DiskCache, DocumentCache, MemoryCache, NoCache,
    TextCache,
};
pub use cli::{Cli, VerbosityLevel};
pub use config::{
    CacheConfig, Config, ConfigError, ConfigManager, FieldSpec, Mapping, NetworkConfig, Source,
    filter_sources,
};
pub use engine::{ProgressCallback, RunSummary, SourcingEngine, SourcingPhase, SourcingProgress};
pub use error::{AnyXmlError, SourceError};
pub use field::{CoercionKind, FieldParser, map_field};
pub use http_client::{AsyncHttpClient, FetchResponse, Fetcher, HttpClientConfig};
pub use libxml2::{LibXml2Wrapper, XmlDocument, XmlNodeRef};
pub use loader::{LoadOutcome, LoadedSource, SourceLoader};
pub use namespace::{NamespaceMap, ScopeOrder, resolve_namespaces};
pub use node::{CollectingSink, ContentNode, JsonLinesSink, NodeSink};
pub use output::Output;
pub use reporter::{CollectingReporter, Reporter, TracingReporter};
pub use schema::{generate_type_declarations, type_declaration};
pub use selector::{Item, select_items};
