//! Source loading
//!
//! Every usable source is fetched (through the text cache) and parsed in its
//! own task. All tasks are joined before anything is assembled; a source that
//! fails is reported and left out, it never stops the others.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::cache::TextCache;
use crate::config::{Mapping, Source, filter_sources};
use crate::error::SourceError;
use crate::http_client::Fetcher;
use crate::libxml2::{LibXml2Wrapper, XmlDocument};
use crate::reporter::Reporter;

/// A source whose document parsed successfully
#[derive(Debug)]
pub struct LoadedSource {
    pub url: String,
    pub mappings: Vec<Mapping>,
    pub document: XmlDocument,
}

/// Result of loading a group of sources
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Successfully parsed sources, in configuration order
    pub sources: Vec<LoadedSource>,
    pub failures: Vec<SourceError>,
}

/// Fetches, caches and parses source documents
#[derive(Clone)]
pub struct SourceLoader {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn TextCache>,
    reporter: Arc<dyn Reporter>,
    wrapper: Arc<LibXml2Wrapper>,
    max_concurrent: usize,
}

impl SourceLoader {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<dyn TextCache>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            reporter,
            wrapper: Arc::new(LibXml2Wrapper::new()),
            max_concurrent: num_cpus::get(),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Raw text for `url`, from the cache when possible
    ///
    /// An empty cached text counts as a miss. A fetched response is accepted
    /// only if it is ok with status 200 and a non-empty body, and is then
    /// written back to the cache. Cache failures are logged and ignored.
    pub async fn load_text(&self, url: &str) -> Result<String, SourceError> {
        match self.cache.get(url).await {
            Ok(Some(text)) if !text.is_empty() => {
                debug!(url, "cache hit");
                return Ok(text);
            }
            Ok(_) => debug!(url, "cache miss"),
            Err(e) => warn!(url, error = %e, "cache read failed"),
        }

        let load_error = |reason: String| SourceError::Load {
            url: url.to_string(),
            reason,
        };

        let response = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| load_error(e.to_string()))?;

        if !response.is_usable() {
            return Err(load_error(format!("HTTP {}", response.status)));
        }
        if response.body.is_empty() {
            return Err(load_error("empty response body".to_string()));
        }

        if let Err(e) = self.cache.set(url, &response.body).await {
            warn!(url, error = %e, "cache write failed");
        }

        Ok(response.body)
    }

    /// Fetch and parse one source; parsing runs on the blocking pool
    pub async fn load_source(&self, source: &Source) -> Result<LoadedSource, SourceError> {
        let text = self.load_text(&source.url).await?;

        let wrapper = Arc::clone(&self.wrapper);
        let parsed = tokio::task::spawn_blocking(move || wrapper.parse_document(&text))
            .await
            .map_err(|e| SourceError::Parse {
                url: source.url.clone(),
                details: format!("parser task failed: {}", e),
            })?;

        let document = parsed.map_err(|e| SourceError::Parse {
            url: source.url.clone(),
            details: e.to_string(),
        })?;

        Ok(LoadedSource {
            url: source.url.clone(),
            mappings: source.mappings.clone(),
            document,
        })
    }

    /// Load every usable source concurrently and wait for all of them
    pub async fn load_all(&self, sources: &[Source]) -> LoadOutcome {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        let tasks: Vec<_> = filter_sources(sources)
            .into_iter()
            .cloned()
            .map(|source| {
                let loader = self.clone();
                let semaphore = Arc::clone(&semaphore);

                tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.map_err(|_| SourceError::Load {
                        url: source.url.clone(),
                        reason: "loader semaphore closed".to_string(),
                    })?;
                    loader.load_source(&source).await
                })
            })
            .collect();

        // Remember urls so a panicked task can still be attributed
        let urls: Vec<String> = filter_sources(sources)
            .into_iter()
            .map(|source| source.url.clone())
            .collect();

        let mut outcome = LoadOutcome::default();
        for (url, joined) in urls.into_iter().zip(join_all(tasks).await) {
            let result = joined.unwrap_or_else(|e| {
                Err(SourceError::Load {
                    url,
                    reason: format!("task join error: {}", e),
                })
            });

            match result {
                Ok(loaded) => outcome.sources.push(loaded),
                Err(error) => {
                    debug!(error = %error, "source dropped");
                    self.reporter.warn(&error.warning());
                    outcome.failures.push(error);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::{CacheError, CacheResult, NetworkError, NetworkResult};
    use crate::http_client::FetchResponse;
    use crate::reporter::CollectingReporter;
    use async_trait::async_trait;
    use mockall::mock;
    use std::time::Duration;

    mock! {
        pub Fetcher {}

        #[async_trait]
        impl Fetcher for Fetcher {
            async fn fetch(&self, url: &str) -> NetworkResult<FetchResponse>;
        }
    }

    mock! {
        pub Cache {}

        #[async_trait]
        impl TextCache for Cache {
            async fn get(&self, url: &str) -> CacheResult<Option<String>>;
            async fn set(&self, url: &str, text: &str) -> CacheResult<()>;
        }
    }

    fn ok(body: &str) -> NetworkResult<FetchResponse> {
        Ok(FetchResponse {
            status: 200,
            ok: true,
            body: body.to_string(),
        })
    }

    fn source(url: &str) -> Source {
        Source {
            url: url.to_string(),
            mappings: vec![Mapping {
                type_name: "Item".to_string(),
                item_selector: "//item".to_string(),
                ..Mapping::default()
            }],
        }
    }

    fn memory_cache() -> Arc<MemoryCache> {
        Arc::new(MemoryCache::new(100, Duration::from_secs(60)))
    }

    fn loader(
        fetcher: MockFetcher,
        cache: Arc<dyn TextCache>,
    ) -> (SourceLoader, Arc<CollectingReporter>) {
        let reporter = Arc::new(CollectingReporter::new());
        let loader = SourceLoader::new(Arc::new(fetcher), cache, reporter.clone());
        (loader, reporter)
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let cache = memory_cache();
        cache.set("https://a/feed.xml", "<rss/>").await.unwrap();

        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().times(0);

        let (loader, _) = loader(fetcher, cache);
        assert_eq!(loader.load_text("https://a/feed.xml").await.unwrap(), "<rss/>");
    }

    #[tokio::test]
    async fn test_empty_cached_text_is_a_miss() {
        let cache = memory_cache();
        cache.set("https://a/feed.xml", "").await.unwrap();

        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| ok("<fresh/>"));

        let (loader, _) = loader(fetcher, cache.clone());
        assert_eq!(loader.load_text("https://a/feed.xml").await.unwrap(), "<fresh/>");
        assert_eq!(
            cache.get("https://a/feed.xml").await.unwrap().as_deref(),
            Some("<fresh/>")
        );
    }

    #[tokio::test]
    async fn test_fetched_text_is_cached() {
        let cache = memory_cache();
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().times(1).returning(|_| ok("<rss/>"));

        let (loader, _) = loader(fetcher, cache.clone());
        loader.load_text("https://a/feed.xml").await.unwrap();
        // Second call is served from the cache; times(1) enforces it
        loader.load_text("https://a/feed.xml").await.unwrap();
    }

    #[tokio::test]
    async fn test_non_200_is_load_error() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().returning(|_| {
            Ok(FetchResponse {
                status: 204,
                ok: true,
                body: String::new(),
            })
        });

        let (loader, _) = loader(fetcher, memory_cache());
        let error = loader.load_text("https://a/feed.xml").await.unwrap_err();
        assert!(matches!(error, SourceError::Load { ref reason, .. } if reason == "HTTP 204"));
    }

    #[tokio::test]
    async fn test_empty_body_is_load_error() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().returning(|_| ok(""));

        let (loader, _) = loader(fetcher, memory_cache());
        assert!(matches!(
            loader.load_text("https://a/feed.xml").await,
            Err(SourceError::Load { .. })
        ));
    }

    #[tokio::test]
    async fn test_cache_failures_are_not_fatal() {
        let mut cache = MockCache::new();
        cache.expect_get().returning(|url| {
            Err(CacheError::ReadError {
                key: url.to_string(),
                details: "disk gone".to_string(),
            })
        });
        cache.expect_set().returning(|url, _| {
            Err(CacheError::WriteError {
                key: url.to_string(),
                details: "disk gone".to_string(),
            })
        });

        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().returning(|_| ok("<rss/>"));

        let (loader, reporter) = loader(fetcher, Arc::new(cache));
        assert_eq!(loader.load_text("https://a/feed.xml").await.unwrap(), "<rss/>");
        assert!(reporter.is_empty());
    }

    #[tokio::test]
    async fn test_load_source_parse_error() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().returning(|_| ok("<rss><item>"));

        let (loader, _) = loader(fetcher, memory_cache());
        let error = loader.load_source(&source("https://a/feed.xml")).await.unwrap_err();
        assert!(matches!(error, SourceError::Parse { .. }));
        assert_eq!(error.url(), "https://a/feed.xml");
    }

    #[tokio::test]
    async fn test_load_all_drops_failures_and_keeps_order() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().returning(|url| match url {
            "https://a" => ok("<a><item/></a>"),
            "https://b" => Err(NetworkError::Timeout {
                url: url.to_string(),
                timeout_seconds: 1,
            }),
            "https://c" => ok("not xml"),
            _ => ok("<d/>"),
        });

        let (loader, reporter) = loader(fetcher, memory_cache());
        let loader = loader.with_max_concurrent(2);

        let sources = vec![
            source("https://a"),
            source("https://b"),
            source("https://c"),
            source("https://d"),
        ];
        let outcome = loader.load_all(&sources).await;

        let urls: Vec<&str> = outcome.sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://d"]);
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(
            reporter.warnings(),
            vec![
                "source \"https://b\" could not be loaded",
                "source \"https://c\" could not be parsed",
            ]
        );
    }

    #[tokio::test]
    async fn test_load_all_skips_unusable_sources() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().times(0);

        let (loader, reporter) = loader(fetcher, memory_cache());
        let sources = vec![
            Source {
                url: String::new(),
                ..source("")
            },
            Source {
                url: "https://a".to_string(),
                mappings: vec![],
            },
        ];

        let outcome = loader.load_all(&sources).await;
        assert!(outcome.sources.is_empty());
        assert!(outcome.failures.is_empty());
        assert!(reporter.is_empty());
    }
}
