//! Content nodes handed to the downstream graph

use std::io::Write;

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::assembler::Record;
use crate::error::Result;

/// Fixed namespace for node ids, so the same record always gets the same id
pub const NODE_ID_NAMESPACE: Uuid = Uuid::from_u128(0x5b1e_6a4e_0f3c_4d8a_9c2e_7a41_d3b8_e610);

/// A record plus the identity fields the graph needs
#[derive(Debug, Clone, PartialEq)]
pub struct ContentNode {
    pub id: String,
    pub type_name: String,
    pub content_digest: String,
    pub props: Map<String, Value>,
}

impl ContentNode {
    pub fn from_record(record: Record) -> Result<Self> {
        let serialized = serde_json::to_string(&record.props)?;
        Ok(Self {
            id: create_node_id(&record.type_name, &serialized),
            content_digest: create_content_digest(&serialized),
            type_name: record.type_name,
            props: record.props,
        })
    }

    /// `{ ...props, id, internal: { type, contentDigest } }`
    pub fn to_json(&self) -> Value {
        let mut object = self.props.clone();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        object.insert(
            "internal".to_string(),
            json!({
                "type": self.type_name,
                "contentDigest": self.content_digest,
            }),
        );
        Value::Object(object)
    }
}

/// Hex SHA-256 of the serialized props
pub fn create_content_digest(serialized_props: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serialized_props.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic UUIDv5 of `"<typeName>-<serialized props>"`
pub fn create_node_id(type_name: &str, serialized_props: &str) -> String {
    let seed = format!("{}-{}", type_name, serialized_props);
    Uuid::new_v5(&NODE_ID_NAMESPACE, seed.as_bytes()).to_string()
}

/// Receives every node created by a run
pub trait NodeSink: Send {
    fn create_node(&mut self, node: ContentNode) -> Result<()>;
}

/// Keeps nodes in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub nodes: Vec<ContentNode>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeSink for CollectingSink {
    fn create_node(&mut self, node: ContentNode) -> Result<()> {
        self.nodes.push(node);
        Ok(())
    }
}

/// Writes one JSON object per line
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    written: usize,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> NodeSink for JsonLinesSink<W> {
    fn create_node(&mut self, node: ContentNode) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &node.to_json())?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}
