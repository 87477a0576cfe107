//! Secret reference resolution
//!
//! Resolves `$secret.<provider>.<name>` references against configured
//! secret providers, with TTL caches for both values and name listings.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

use missio_domain::{SecretProvider, SecretProviderKind};

use crate::ports::{Clock, SecretError, SecretVaultBackend};

/// How long cached secret values and name listings stay fresh.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// `$secret.<provider>.<name>` reference pattern. Provider and secret names
/// are limited to the characters vaults actually allow.
#[allow(clippy::unwrap_used)] // literal pattern, compiles
static SECRET_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$secret\.([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)").unwrap());

struct CacheEntry<T> {
    value: T,
    fetched_at: DateTime<Utc>,
}

/// Resolves secret references through registered vault backends.
///
/// Successful lookups are cached per vault URL with a TTL; failures are
/// never cached, so a transient vault error does not stick.
pub struct SecretResolver {
    backends: HashMap<SecretProviderKind, Arc<dyn SecretVaultBackend>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    values: RwLock<HashMap<String, CacheEntry<String>>>,
    names: RwLock<HashMap<String, CacheEntry<Vec<String>>>>,
}

impl SecretResolver {
    /// Creates a resolver with no registered backends and the default TTL.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            backends: HashMap::new(),
            clock,
            ttl: DEFAULT_CACHE_TTL,
            values: RwLock::new(HashMap::new()),
            names: RwLock::new(HashMap::new()),
        }
    }

    /// Overrides the cache TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Registers a backend for a provider kind, replacing any previous one.
    #[must_use]
    pub fn with_backend(
        mut self,
        kind: SecretProviderKind,
        backend: Arc<dyn SecretVaultBackend>,
    ) -> Self {
        self.backends.insert(kind, backend);
        self
    }

    /// Resolves one secret by provider name.
    ///
    /// Returns `Ok(None)` when the provider is unknown, disabled, has no
    /// registered backend, or the vault has no secret with that name.
    ///
    /// # Errors
    ///
    /// Returns an error when the vault lookup itself fails.
    pub async fn resolve_secret(
        &self,
        providers: &[SecretProvider],
        provider_name: &str,
        secret_name: &str,
    ) -> Result<Option<String>, SecretError> {
        let Some(provider) = providers
            .iter()
            .find(|p| p.name == provider_name && !p.disabled)
        else {
            return Ok(None);
        };
        let Some(backend) = self.backends.get(&provider.kind) else {
            log::warn!(
                "no backend registered for secret provider kind '{}'",
                provider.kind.as_str()
            );
            return Ok(None);
        };

        let cache_key = format!("{}|{secret_name}", provider.url);
        if let Some(cached) = self.cached_value(&cache_key) {
            return Ok(Some(cached));
        }

        let fetched = backend.fetch_secret(&provider.url, secret_name).await?;
        if let Some(value) = &fetched {
            let mut values = write_lock(&self.values);
            values.insert(
                cache_key,
                CacheEntry {
                    value: value.clone(),
                    fetched_at: self.clock.now(),
                },
            );
        }
        Ok(fetched)
    }

    /// Replaces every `$secret.<provider>.<name>` reference in `text`.
    ///
    /// Returns the substituted text and the number of references replaced.
    /// References that fail to resolve (unknown provider, missing secret,
    /// vault error) are logged and left in place.
    pub async fn substitute_references(
        &self,
        text: &str,
        providers: &[SecretProvider],
    ) -> (String, usize) {
        let matches: Vec<(usize, usize, String, String)> = SECRET_REF
            .captures_iter(text)
            .filter_map(|caps| {
                let full = caps.get(0)?;
                Some((
                    full.start(),
                    full.end(),
                    caps.get(1)?.as_str().to_string(),
                    caps.get(2)?.as_str().to_string(),
                ))
            })
            .collect();

        if matches.is_empty() {
            return (text.to_string(), 0);
        }

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut replaced = 0;

        for (start, end, provider_name, secret_name) in matches {
            out.push_str(&text[cursor..start]);
            cursor = end;

            match self
                .resolve_secret(providers, &provider_name, &secret_name)
                .await
            {
                Ok(Some(value)) => {
                    out.push_str(&value);
                    replaced += 1;
                }
                Ok(None) => {
                    log::warn!("secret reference '$secret.{provider_name}.{secret_name}' did not resolve");
                    out.push_str(&text[start..end]);
                }
                Err(err) => {
                    log::warn!(
                        "secret reference '$secret.{provider_name}.{secret_name}' failed: {err}"
                    );
                    out.push_str(&text[start..end]);
                }
            }
        }

        out.push_str(&text[cursor..]);
        (out, replaced)
    }

    /// Convenience wrapper around [`Self::substitute_references`] that
    /// drops the replacement count.
    pub async fn resolve_secret_references(
        &self,
        text: &str,
        providers: &[SecretProvider],
    ) -> String {
        self.substitute_references(text, providers).await.0
    }

    /// Composes placeholder interpolation with secret-reference
    /// substitution, for fields (such as an OAuth2 client secret) that
    /// support secrets outside the variable layer.
    pub async fn interpolate_with_secrets(
        &self,
        template: &str,
        variables: &HashMap<String, String>,
        providers: &[SecretProvider],
    ) -> String {
        let text = crate::interpolate::interpolate(template, variables);
        if !text.contains("$secret.") {
            return text;
        }
        let providers: Vec<SecretProvider> = providers
            .iter()
            .map(|provider| {
                let mut provider = provider.clone();
                provider.url = crate::interpolate::interpolate(&provider.url, variables);
                provider
            })
            .collect();
        self.resolve_secret_references(&text, &providers).await
    }

    /// Lists the secret names a provider offers, through the names cache.
    ///
    /// # Errors
    ///
    /// Returns an error when the vault listing fails. Unknown, disabled and
    /// backend-less providers list as empty.
    pub async fn list_secret_names(
        &self,
        provider: &SecretProvider,
    ) -> Result<Vec<String>, SecretError> {
        if provider.disabled {
            return Ok(Vec::new());
        }
        let Some(backend) = self.backends.get(&provider.kind) else {
            return Ok(Vec::new());
        };

        let cache_key = names_cache_key(provider);
        if let Some(cached) = self.cached_names(&cache_key) {
            return Ok(cached);
        }

        let names = backend.list_secret_names(&provider.url).await?;
        let mut cache = write_lock(&self.names);
        cache.insert(
            cache_key,
            CacheEntry {
                value: names.clone(),
                fetched_at: self.clock.now(),
            },
        );
        Ok(names)
    }

    /// Returns the cached name listing for a provider without touching the
    /// network, or `None` when nothing fresh is cached.
    #[must_use]
    pub fn cached_secret_names(&self, provider: &SecretProvider) -> Option<Vec<String>> {
        self.cached_names(&names_cache_key(provider))
    }

    /// Warms the names cache for every enabled provider. Failures are
    /// logged and skipped; prefetching is best-effort.
    pub async fn prefetch_secret_names(&self, providers: &[SecretProvider]) {
        for provider in providers.iter().filter(|p| !p.disabled) {
            if let Err(err) = self.list_secret_names(provider).await {
                log::warn!("prefetch of secret names for '{}' failed: {err}", provider.name);
            }
        }
    }

    /// Drops every cached value and name listing.
    pub fn clear_cache(&self) {
        write_lock(&self.values).clear();
        write_lock(&self.names).clear();
    }

    fn cached_value(&self, key: &str) -> Option<String> {
        let values = read_lock(&self.values);
        let entry = values.get(key)?;
        self.is_fresh(entry.fetched_at).then(|| entry.value.clone())
    }

    fn cached_names(&self, key: &str) -> Option<Vec<String>> {
        let names = read_lock(&self.names);
        let entry = names.get(key)?;
        self.is_fresh(entry.fetched_at).then(|| entry.value.clone())
    }

    fn is_fresh(&self, fetched_at: DateTime<Utc>) -> bool {
        let age = self.clock.now().signed_duration_since(fetched_at);
        age.to_std().is_ok_and(|age| age < self.ttl)
    }
}

/// Listings are cached per provider name and resolved vault URL.
fn names_cache_key(provider: &SecretProvider) -> String {
    format!("{}|{}", provider.name, provider.url)
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}
