//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use indexmap::IndexMap;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use anyxml_source::error::NetworkResult;
use anyxml_source::{
    CacheConfig, Config, FetchResponse, Fetcher, FieldSpec, Mapping, NetworkConfig, Source,
};

pub const FEED_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example feed</title>
    <item>
      <title>First post</title>
      <views>12</views>
      <published>yes</published>
    </item>
    <item>
      <title>Second post</title>
      <views>3.5k</views>
      <published></published>
    </item>
  </channel>
</rss>"#;

pub const NAMESPACED_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:media="http://search.yahoo.com/mrss/">
  <section>
    <group>
      <entry>
        <media:title>Deep</media:title>
      </entry>
    </group>
  </section>
</feed>"#;

pub fn field(schema_type: &str, selector: &str) -> FieldSpec {
    FieldSpec {
        schema_type: schema_type.to_string(),
        selector: Some(selector.to_string()),
        ..FieldSpec::default()
    }
}

pub fn mapping(type_name: &str, item_selector: &str, props: Vec<(&str, FieldSpec)>) -> Mapping {
    let item_props: IndexMap<String, FieldSpec> = props
        .into_iter()
        .map(|(key, spec)| (key.to_string(), spec))
        .collect();

    Mapping {
        type_name: type_name.to_string(),
        item_selector: item_selector.to_string(),
        item_props,
    }
}

/// The mapping used against [`FEED_XML`]
pub fn post_mapping() -> Mapping {
    mapping(
        "Post",
        "//item",
        vec![
            ("title", field("String!", "title")),
            ("views", field("Int", "views")),
            ("published", field("Boolean", "published")),
        ],
    )
}

/// Configuration with a private cache directory and no retry delays
pub fn test_config(cache_dir: &Path, sources: Vec<Source>) -> Config {
    Config {
        sources,
        cache: CacheConfig {
            directory: cache_dir.to_path_buf(),
            ..CacheConfig::default()
        },
        network: NetworkConfig {
            timeout_seconds: 5,
            retry_attempts: 0,
            retry_delay_ms: 1,
        },
        ..Config::default()
    }
}

pub fn temp_cache_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}

/// Serve `body` at `route` on a fresh mock server
pub async fn serve_xml(route: &str, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xml")
                .set_body_string(body),
        )
        .mount(&server)
        .await;
    server
}

/// Serves fixed bodies by url without a network; unknown urls get a 404
pub struct StaticFetcher {
    bodies: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            bodies: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> NetworkResult<FetchResponse> {
        Ok(match self.bodies.get(url) {
            Some(body) => FetchResponse {
                status: 200,
                ok: true,
                body: body.clone(),
            },
            None => FetchResponse {
                status: 404,
                ok: false,
                body: String::new(),
            },
        })
    }
}
