//! Classification of module sources and parsing of provider source addresses,
//! both behind expiring caches.
//!
//! Classification is pattern based and best effort: a local path shaped like
//! `a/b/c` is taken for a registry address.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kit::constants::{
    DEFAULT_PROVIDER_HOSTNAME, DEFAULT_PROVIDER_NAMESPACE, GIT_SOURCE_PREFIX, REF_QUERY_SEPARATOR,
};
use regex::Regex;
use strum::{AsRefStr, Display, EnumString};

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::context::Context;

lazy_static! {
    static ref REGISTRY_SOURCE: Regex = Regex::new(r"^[\w-]+/[\w-]+/[\w-]+$").unwrap();
    static ref PROVIDER_SEGMENT: Regex = Regex::new(r"^[a-z0-9][a-z0-9_-]*$").unwrap();
    static ref PROVIDER_HOSTNAME: Regex =
        Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)+(:\d+)?$")
            .unwrap();
}

pub const DEFAULT_MODULE_SOURCE_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_PROVIDER_SOURCE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    Local,
    Git,
    Http,
    Registry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedSource {
    pub path: String,
    pub version: Option<String>,
    pub kind: SourceKind,
}

/// Splits a module source on its first `?ref=` and classifies the remaining path.
pub fn classify(source: &str) -> ClassifiedSource {
    let (path, version) = match source.split_once(REF_QUERY_SEPARATOR) {
        Some((path, version)) => {
            (path, Some(version.to_string()).filter(|version| !version.is_empty()))
        }
        None => (source, None),
    };
    let kind = if path.starts_with(GIT_SOURCE_PREFIX) {
        SourceKind::Git
    } else if path.starts_with("http://") || path.starts_with("https://") {
        SourceKind::Http
    } else if REGISTRY_SOURCE.is_match(path) {
        SourceKind::Registry
    } else {
        SourceKind::Local
    };
    ClassifiedSource { path: path.to_string(), version, kind }
}

/// Module source classifier, memoized per raw source string.
#[derive(Debug)]
pub struct SourceResolver {
    cache: TtlCache<String, ClassifiedSource>,
    classifications: AtomicUsize,
}

impl SourceResolver {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        SourceResolver {
            cache: TtlCache::with_clock(ttl, clock),
            classifications: AtomicUsize::new(0),
        }
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.cache = self.cache.with_context(ctx);
        self
    }

    pub fn resolve(&self, source: &str) -> ClassifiedSource {
        self.cache.get_or_insert_with(&source.to_string(), || {
            self.classifications.fetch_add(1, Ordering::SeqCst);
            classify(source)
        })
    }

    /// How many times a source was actually classified, cache hits excluded.
    pub fn classification_count(&self) -> usize {
        self.classifications.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &TtlCache<String, ClassifiedSource> {
        &self.cache
    }
}

impl Default for SourceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MODULE_SOURCE_TTL)
    }
}

/// A provider source address, `[hostname/]namespace/type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProviderSource {
    pub hostname: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub provider_type: String,
}

impl fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.hostname, self.namespace, self.provider_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid provider source '{source_address}': {reason}")]
pub struct InvalidProviderSource {
    pub source_address: String,
    pub reason: String,
}

impl ProviderSource {
    /// Parses an address, defaulting the hostname and, for a bare type, the namespace.
    /// Addresses are case-insensitive and normalized to lowercase.
    pub fn parse(address: &str) -> Result<Self, InvalidProviderSource> {
        let invalid = |reason: &str| InvalidProviderSource {
            source_address: address.to_string(),
            reason: reason.to_string(),
        };
        let normalized = address.trim().to_lowercase();
        let segments: Vec<&str> = normalized.split('/').collect();
        let (hostname, namespace, provider_type) = match segments.as_slice() {
            [provider_type] => (DEFAULT_PROVIDER_HOSTNAME, DEFAULT_PROVIDER_NAMESPACE, *provider_type),
            [namespace, provider_type] => (DEFAULT_PROVIDER_HOSTNAME, *namespace, *provider_type),
            [hostname, namespace, provider_type] => (*hostname, *namespace, *provider_type),
            _ => return Err(invalid("expected [hostname/]namespace/type")),
        };
        if !PROVIDER_HOSTNAME.is_match(hostname) {
            return Err(invalid("hostname is not a valid DNS name"));
        }
        if !PROVIDER_SEGMENT.is_match(namespace) {
            return Err(invalid("namespace must contain only letters, digits, '_' or '-'"));
        }
        if !PROVIDER_SEGMENT.is_match(provider_type) {
            return Err(invalid("type must contain only letters, digits, '_' or '-'"));
        }
        Ok(ProviderSource {
            hostname: hostname.to_string(),
            namespace: namespace.to_string(),
            provider_type: provider_type.to_string(),
        })
    }
}

/// Provider source parser; only successful parses are cached.
#[derive(Debug)]
pub struct ProviderSourceResolver {
    cache: TtlCache<String, ProviderSource>,
    parses: AtomicUsize,
}

impl ProviderSourceResolver {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        ProviderSourceResolver { cache: TtlCache::with_clock(ttl, clock), parses: AtomicUsize::new(0) }
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.cache = self.cache.with_context(ctx);
        self
    }

    pub fn resolve(&self, address: &str) -> Result<ProviderSource, InvalidProviderSource> {
        let key = address.to_string();
        if let Some(source) = self.cache.get(&key) {
            return Ok(source);
        }
        self.parses.fetch_add(1, Ordering::SeqCst);
        let source = ProviderSource::parse(address)?;
        self.cache.insert(key, source.clone());
        Ok(source)
    }

    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &TtlCache<String, ProviderSource> {
        &self.cache
    }
}

impl Default for ProviderSourceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER_SOURCE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::cache::ManualClock;

    #[test_case("git::https://example.com/mod.git?ref=v1.2.3", "git::https://example.com/mod.git", Some("v1.2.3"), SourceKind::Git ; "git with ref")]
    #[test_case("git::ssh://git@example.com/mod.git", "git::ssh://git@example.com/mod.git", None, SourceKind::Git ; "git without ref")]
    #[test_case("https://example.com/mod.zip", "https://example.com/mod.zip", None, SourceKind::Http ; "https archive")]
    #[test_case("http://example.com/mod.zip?ref=", "http://example.com/mod.zip", None, SourceKind::Http ; "empty ref")]
    #[test_case("terraform-aws-modules/vpc/aws", "terraform-aws-modules/vpc/aws", None, SourceKind::Registry ; "registry")]
    #[test_case("./modules/network", "./modules/network", None, SourceKind::Local ; "relative path")]
    #[test_case("../shared", "../shared", None, SourceKind::Local ; "parent path")]
    #[test_case("a/b/c/d", "a/b/c/d", None, SourceKind::Local ; "four segments")]
    #[test_case("x?ref=1?ref=2", "x", Some("1?ref=2"), SourceKind::Local ; "split on first ref")]
    fn test_classify(source: &str, path: &str, version: Option<&str>, kind: SourceKind) {
        let classified = classify(source);
        assert_eq!(classified.path, path);
        assert_eq!(classified.version.as_deref(), version);
        assert_eq!(classified.kind, kind);
    }

    #[test]
    fn test_resolver_caches_within_ttl() {
        let clock = Arc::new(ManualClock::new());
        let resolver = SourceResolver::with_clock(DEFAULT_MODULE_SOURCE_TTL, clock.clone());
        let source = "git::https://example.com/mod.git?ref=v1.2.3";

        let first = resolver.resolve(source);
        let second = resolver.resolve(source);
        assert_eq!(first, second);
        assert_eq!(resolver.classification_count(), 1);

        resolver.resolve("./other");
        assert_eq!(resolver.classification_count(), 2);

        clock.advance(DEFAULT_MODULE_SOURCE_TTL);
        resolver.resolve(source);
        assert_eq!(resolver.classification_count(), 3);
    }

    #[test]
    fn test_resolvers_drop_stale_sources() {
        let clock = Arc::new(ManualClock::new());
        let modules = SourceResolver::with_clock(DEFAULT_MODULE_SOURCE_TTL, clock.clone());
        let providers = ProviderSourceResolver::with_clock(DEFAULT_PROVIDER_SOURCE_TTL, clock.clone());
        modules.resolve("./a");
        providers.resolve("aws").unwrap();

        clock.advance(DEFAULT_MODULE_SOURCE_TTL);
        modules.resolve("./b");
        providers.resolve("google").unwrap();
        assert_eq!(modules.cache().len(), 1);
        assert_eq!(providers.cache().len(), 1);
        assert!(modules.cache().get(&"./b".to_string()).is_some());
    }

    #[test_case("aws", "registry.terraform.io/hashicorp/aws" ; "bare type")]
    #[test_case("integrations/github", "registry.terraform.io/integrations/github" ; "namespaced")]
    #[test_case("example.com/acme/widget", "example.com/acme/widget" ; "custom hostname")]
    #[test_case("Hashicorp/AWS", "registry.terraform.io/hashicorp/aws" ; "case insensitive")]
    fn test_provider_source(address: &str, expected: &str) {
        assert_eq!(ProviderSource::parse(address).unwrap().to_string(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("a/b/c/d" ; "too many segments")]
    #[test_case("hashicorp/" ; "empty type")]
    #[test_case("localhost/acme/widget" ; "hostname without dot")]
    #[test_case("acme/wid get" ; "space")]
    fn test_invalid_provider_source(address: &str) {
        assert!(ProviderSource::parse(address).is_err());
    }

    #[test]
    fn test_provider_resolver_caches_successes_only() {
        let resolver = ProviderSourceResolver::default();
        resolver.resolve("aws").unwrap();
        resolver.resolve("aws").unwrap();
        assert_eq!(resolver.parse_count(), 1);
        assert!(resolver.resolve("a/b/c/d").is_err());
        assert!(resolver.resolve("a/b/c/d").is_err());
        assert_eq!(resolver.parse_count(), 3);
        assert_eq!(resolver.cache().len(), 1);
        assert_eq!(resolver.cache().ttl(), Duration::from_secs(300));
    }
}
