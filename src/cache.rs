//! Generation-keyed offline resource cache.
//!
//! Responses are stored as plain files under `<root>/<cache name>/<sha256 of url>`.
//! One cache is named after the current generation string and holds the
//! precached resources; a second, runtime cache collects responses from a
//! small set of hosts as they are fetched. Activating a new generation removes
//! every other cache directory.

use crate::model::Settings;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use ureq::Agent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Document,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub destination: Destination,
}

impl Request {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            destination: Destination::Other,
        }
    }

    pub fn document(url: &str) -> Self {
        Self {
            url: url.to_string(),
            destination: Destination::Document,
        }
    }

    pub fn host(&self) -> Option<&str> {
        url_host(&self.url)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("request for {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("cache io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Network side of the cache.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CacheError>;
}

pub struct HttpFetcher {
    agent: Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CacheError> {
        debug!("fetching {url}");
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(status)) => {
                return Err(CacheError::Status {
                    url: url.to_string(),
                    status,
                });
            }
            Err(err) => {
                return Err(CacheError::Network {
                    url: url.to_string(),
                    reason: err.to_string(),
                });
            }
        };

        let (_parts, body) = response.into_parts();
        let mut bytes = Vec::new();
        body.into_reader()
            .read_to_end(&mut bytes)
            .map_err(|err| CacheError::Network {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        Ok(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub generation: String,
    pub runtime_cache: String,
    pub runtime_hosts: Vec<String>,
    pub precache: Vec<String>,
    pub offline_document: String,
}

impl From<&Settings> for CachePolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            generation: settings.cache_generation.clone(),
            runtime_cache: settings.runtime_cache.clone(),
            runtime_hosts: settings.runtime_hosts.clone(),
            precache: settings.precache_urls.clone(),
            offline_document: settings.offline_document.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OfflineCache {
    root: PathBuf,
    policy: CachePolicy,
}

impl OfflineCache {
    pub fn new(root: &Path, policy: CachePolicy) -> Self {
        Self {
            root: root.to_path_buf(),
            policy,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Downloads every precache url into the current generation.
    pub fn install(&self, fetcher: &dyn Fetcher) -> Result<usize, CacheError> {
        info!(
            "installing cache {} ({} resources)",
            self.policy.generation,
            self.policy.precache.len()
        );
        for url in &self.policy.precache {
            let bytes = fetcher.fetch(url)?;
            self.store(&self.policy.generation, url, &bytes)?;
        }
        Ok(self.policy.precache.len())
    }

    /// Removes every cache that is neither the current generation nor the runtime cache.
    pub fn activate(&self) -> Result<Vec<String>, CacheError> {
        let mut removed = Vec::new();
        for name in self.cache_names()? {
            if name == self.policy.generation || name == self.policy.runtime_cache {
                continue;
            }
            let dir = self.root.join(&name);
            info!("deleting old cache {name}");
            fs::remove_dir_all(&dir).map_err(|err| CacheError::io(&dir, err))?;
            removed.push(name);
        }
        Ok(removed)
    }

    pub fn fetch(&self, request: &Request, fetcher: &dyn Fetcher) -> Result<Vec<u8>, CacheError> {
        if self.is_runtime_host(request) {
            if let Some(bytes) = self.read(&self.policy.runtime_cache, &request.url) {
                return Ok(bytes);
            }
            let bytes = fetcher.fetch(&request.url)?;
            if let Err(err) = self.store(&self.policy.runtime_cache, &request.url, &bytes) {
                warn!("failed to store {} in runtime cache: {err}", request.url);
            }
            return Ok(bytes);
        }

        if let Some(bytes) = self.lookup(&request.url) {
            return Ok(bytes);
        }

        match fetcher.fetch(&request.url) {
            Ok(bytes) => Ok(bytes),
            Err(err) if request.destination == Destination::Document => {
                debug!("serving offline document for {}: {err}", request.url);
                self.lookup(&self.policy.offline_document).ok_or(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Finds `url` in any cache, current generation first.
    pub fn lookup(&self, url: &str) -> Option<Vec<u8>> {
        if let Some(bytes) = self.read(&self.policy.generation, url) {
            return Some(bytes);
        }
        self.cache_names()
            .ok()?
            .into_iter()
            .filter(|name| name != &self.policy.generation)
            .find_map(|name| self.read(&name, url))
    }

    pub fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let read_dir = fs::read_dir(&self.root).map_err(|err| CacheError::io(&self.root, err))?;
        let mut names: Vec<String> = read_dir
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false))
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    fn is_runtime_host(&self, request: &Request) -> bool {
        request.host().is_some_and(|host| {
            self.policy
                .runtime_hosts
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(host))
        })
    }

    fn read(&self, cache_name: &str, url: &str) -> Option<Vec<u8>> {
        fs::read(self.entry_path(cache_name, url)).ok()
    }

    fn store(&self, cache_name: &str, url: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let dir = self.root.join(cache_name);
        fs::create_dir_all(&dir).map_err(|err| CacheError::io(&dir, err))?;
        let path = self.entry_path(cache_name, url);
        let partial = path.with_extension("part");
        fs::write(&partial, bytes).map_err(|err| CacheError::io(&partial, err))?;
        fs::rename(&partial, &path).map_err(|err| CacheError::io(&path, err))?;
        debug!("cached {url} in {cache_name}");
        Ok(())
    }

    fn entry_path(&self, cache_name: &str, url: &str) -> PathBuf {
        self.root.join(cache_name).join(url_key(url))
    }
}

fn url_key(url: &str) -> String {
    Sha256::digest(url.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn url_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeNetwork {
        pages: HashMap<String, Vec<u8>>,
        requests: RefCell<Vec<String>>,
    }

    impl FakeNetwork {
        fn with(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.as_bytes().to_vec()))
                    .collect(),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn offline() -> Self {
            Self::default()
        }
    }

    impl Fetcher for FakeNetwork {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, CacheError> {
            self.requests.borrow_mut().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| CacheError::Network {
                url: url.to_string(),
                reason: String::from("offline"),
            })
        }
    }

    fn policy(precache: &[&str]) -> CachePolicy {
        CachePolicy {
            generation: String::from("app-v2"),
            runtime_cache: String::from("runtime-v1"),
            runtime_hosts: vec![String::from("www.youtube.com")],
            precache: precache.iter().map(|url| url.to_string()).collect(),
            offline_document: String::from("/index.html"),
        }
    }

    #[test]
    fn extracts_host_from_urls() {
        assert_eq!(url_host("https://www.youtube.com/iframe_api"), Some("www.youtube.com"));
        assert_eq!(url_host("http://user@host:8080/a?b"), Some("host"));
        assert_eq!(url_host("/index.html"), None);
    }

    #[test]
    fn installed_resources_are_served_without_network() {
        let dir = tempdir().expect("tempdir");
        let cache = OfflineCache::new(dir.path(), policy(&["/index.html", "/styles.css"]));
        let online = FakeNetwork::with(&[("/index.html", "<html>"), ("/styles.css", "body{}")]);
        assert_eq!(cache.install(&online).expect("install"), 2);

        let offline = FakeNetwork::offline();
        let bytes = cache
            .fetch(&Request::new("/styles.css"), &offline)
            .expect("cached");
        assert_eq!(bytes, b"body{}");
        assert!(offline.requests.borrow().is_empty());
    }

    #[test]
    fn install_fails_when_a_resource_is_unreachable() {
        let dir = tempdir().expect("tempdir");
        let cache = OfflineCache::new(dir.path(), policy(&["/index.html", "/missing.js"]));
        let network = FakeNetwork::with(&[("/index.html", "<html>")]);
        assert!(cache.install(&network).is_err());
    }

    #[test]
    fn uncached_requests_fall_back_to_network_without_storing() {
        let dir = tempdir().expect("tempdir");
        let cache = OfflineCache::new(dir.path(), policy(&[]));
        let network = FakeNetwork::with(&[("https://cdn.example/a.mp3", "audio")]);

        let request = Request::new("https://cdn.example/a.mp3");
        assert_eq!(cache.fetch(&request, &network).expect("fetched"), b"audio");
        assert_eq!(cache.lookup(&request.url), None);
    }

    #[test]
    fn runtime_hosts_are_cached_on_first_fetch() {
        let dir = tempdir().expect("tempdir");
        let cache = OfflineCache::new(dir.path(), policy(&[]));
        let network = FakeNetwork::with(&[("https://www.youtube.com/iframe_api", "api")]);
        let request = Request::new("https://www.youtube.com/iframe_api");

        cache.fetch(&request, &network).expect("first");
        cache.fetch(&request, &network).expect("second");

        assert_eq!(network.requests.borrow().len(), 1);
        assert_eq!(cache.cache_names().expect("names"), vec!["runtime-v1"]);
    }

    #[test]
    fn navigation_falls_back_to_offline_document() {
        let dir = tempdir().expect("tempdir");
        let cache = OfflineCache::new(dir.path(), policy(&["/index.html"]));
        cache
            .install(&FakeNetwork::with(&[("/index.html", "<offline>")]))
            .expect("install");

        let offline = FakeNetwork::offline();
        let page = cache
            .fetch(&Request::document("/playlist.html"), &offline)
            .expect("fallback");
        assert_eq!(page, b"<offline>");

        let err = cache
            .fetch(&Request::new("/playlist.js"), &offline)
            .expect_err("not a navigation");
        assert!(matches!(err, CacheError::Network { .. }));
    }

    #[test]
    fn activation_evicts_previous_generations() {
        let dir = tempdir().expect("tempdir");
        let network = FakeNetwork::with(&[("/index.html", "old")]);
        let mut old_policy = policy(&["/index.html"]);
        old_policy.generation = String::from("app-v1");
        OfflineCache::new(dir.path(), old_policy)
            .install(&network)
            .expect("old install");

        let cache = OfflineCache::new(dir.path(), policy(&[]));
        assert_eq!(cache.lookup("/index.html"), Some(b"old".to_vec()));

        let removed = cache.activate().expect("activate");
        assert_eq!(removed, vec!["app-v1"]);
        assert_eq!(cache.lookup("/index.html"), None);
    }
}
