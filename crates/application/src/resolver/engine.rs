//! Layered variable resolution

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use missio_domain::{
    Collection, Environment, Globals, RequestDefaults, ResolvedValue, SecretProvider, Variable,
    VariableSource,
};

use crate::interpolate::{interpolate, interpolate_values};
use crate::ports::FileSystem;
use crate::secrets::SecretResolver;
use crate::secure::SecureStore;

use super::dotenv::parse_dotenv;

/// Merges configuration layers into a resolved variable map.
///
/// Precedence, lowest to highest: globals, collection defaults, folder
/// defaults, parent environment, dotenv file, active environment. Later
/// layers overwrite earlier ones per variable name; provenance records the
/// last layer that wrote each value.
pub struct VariableEngine {
    globals: RwLock<Globals>,
    secure: SecureStore,
    secrets: Arc<SecretResolver>,
    fs: Arc<dyn FileSystem>,
}

impl VariableEngine {
    /// Creates an engine with empty globals.
    #[must_use]
    pub fn new(secure: SecureStore, secrets: Arc<SecretResolver>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            globals: RwLock::new(Globals::default()),
            secure,
            secrets,
            fs,
        }
    }

    /// Replaces the global variable set.
    pub async fn set_globals(&self, globals: Globals) {
        *self.globals.write().await = globals;
    }

    /// Returns a snapshot of the global variable set.
    pub async fn globals(&self) -> Globals {
        self.globals.read().await.clone()
    }

    /// Resolves the full variable map for a collection and optional folder.
    ///
    /// Secret variables resolve through the secure store (for `secure:`
    /// references) or their literal text, and always carry the `Secret`
    /// source. Variables that cannot be resolved (missing secure value,
    /// empty variant list) are omitted rather than erroring. After merging,
    /// placeholders are resolved in place and `$secret.` references are
    /// substituted through the configured providers.
    pub async fn resolve(
        &self,
        collection: &Collection,
        folder: Option<&RequestDefaults>,
    ) -> HashMap<String, ResolvedValue> {
        let mut map = HashMap::new();

        {
            let globals = self.globals.read().await;
            self.apply_layer(&mut map, globals.variables.iter(), VariableSource::Global)
                .await;
        }
        self.apply_layer(
            &mut map,
            collection.request.variables.iter(),
            VariableSource::Collection,
        )
        .await;
        if let Some(folder) = folder {
            self.apply_layer(&mut map, folder.variables.iter(), VariableSource::Folder)
                .await;
        }

        if let Some(environment) = collection.active_environment() {
            // One hop only; a parent's own `extends` is ignored.
            if let Some(parent) = environment
                .extends
                .as_deref()
                .and_then(|name| collection.environment(name))
            {
                self.apply_environment(&mut map, parent).await;
            }

            if let Some(rel_path) = environment.dot_env_file_path.as_deref() {
                self.apply_dotenv(&mut map, collection, rel_path).await;
            }

            self.apply_environment(&mut map, environment).await;
        }

        interpolate_values(&mut map);
        self.substitute_secret_references(&mut map, &collection.secret_providers)
            .await;

        map
    }

    /// Resolves the variable map without provenance. Values are identical
    /// to those produced by [`Self::resolve`].
    pub async fn resolve_values(
        &self,
        collection: &Collection,
        folder: Option<&RequestDefaults>,
    ) -> HashMap<String, String> {
        plain_map(&self.resolve(collection, folder).await)
    }

    /// Resolves the variable map and interpolates `template` against it,
    /// including `$secret.` references in the template itself.
    pub async fn interpolate_with_secrets(
        &self,
        template: &str,
        collection: &Collection,
        folder: Option<&RequestDefaults>,
    ) -> String {
        let plain = self.resolve_values(collection, folder).await;
        self.secrets
            .interpolate_with_secrets(template, &plain, &collection.secret_providers)
            .await
    }

    /// Applies one environment: non-secret variables first, then secret
    /// ones, so a secret wins a same-name collision within the layer no
    /// matter where it is declared.
    async fn apply_environment(
        &self,
        map: &mut HashMap<String, ResolvedValue>,
        environment: &Environment,
    ) {
        self.apply_layer(
            map,
            environment.plain_variables(),
            VariableSource::Environment,
        )
        .await;
        self.apply_layer(
            map,
            environment.secret_variables(),
            VariableSource::Environment,
        )
        .await;
    }

    async fn apply_layer<'a>(
        &self,
        map: &mut HashMap<String, ResolvedValue>,
        variables: impl Iterator<Item = &'a Variable>,
        source: VariableSource,
    ) {
        for variable in variables.filter(|v| !v.disabled) {
            let Some(text) = variable.effective_value() else {
                continue;
            };

            if variable.secret {
                let resolved = if variable.secure {
                    match self.secure.get(text).await {
                        Ok(Some(value)) => Some(value),
                        Ok(None) => {
                            log::warn!(
                                "secure value for variable '{}' is missing from the store",
                                variable.name
                            );
                            None
                        }
                        Err(err) => {
                            log::warn!(
                                "secure value for variable '{}' could not be read: {err}",
                                variable.name
                            );
                            None
                        }
                    }
                } else {
                    Some(text.to_string())
                };

                if let Some(value) = resolved {
                    map.insert(
                        variable.name.clone(),
                        ResolvedValue::new(value, VariableSource::Secret),
                    );
                }
            } else {
                map.insert(variable.name.clone(), ResolvedValue::new(text, source));
            }
        }
    }

    async fn apply_dotenv(
        &self,
        map: &mut HashMap<String, ResolvedValue>,
        collection: &Collection,
        rel_path: &str,
    ) {
        let path = collection.root.join(rel_path);
        match self.fs.read_to_string(&path).await {
            Ok(content) => {
                for (key, value) in parse_dotenv(&content) {
                    map.insert(key, ResolvedValue::new(value, VariableSource::Dotenv));
                }
            }
            Err(err) => {
                log::warn!("dotenv file '{}' could not be read: {err}", path.display());
            }
        }
    }

    async fn substitute_secret_references(
        &self,
        map: &mut HashMap<String, ResolvedValue>,
        providers: &[SecretProvider],
    ) {
        if providers.is_empty() {
            return;
        }

        let names: Vec<String> = map
            .iter()
            .filter(|(_, resolved)| resolved.value.contains("$secret."))
            .map(|(name, _)| name.clone())
            .collect();
        if names.is_empty() {
            return;
        }

        let providers = interpolated_providers(providers, &plain_map(map));
        for name in names {
            let Some(current) = map.get(&name).map(|r| r.value.clone()) else {
                continue;
            };
            let (substituted, replaced) = self
                .secrets
                .substitute_references(&current, &providers)
                .await;
            if replaced > 0 {
                map.insert(name, ResolvedValue::new(substituted, VariableSource::Secret));
            }
        }
    }
}

fn plain_map(map: &HashMap<String, ResolvedValue>) -> HashMap<String, String> {
    map.iter()
        .map(|(name, resolved)| (name.clone(), resolved.value.clone()))
        .collect()
}

/// Provider URLs may carry `{{var}}` placeholders; resolve them against the
/// merged map before dispatching to a vault.
fn interpolated_providers(
    providers: &[SecretProvider],
    variables: &HashMap<String, String>,
) -> Vec<SecretProvider> {
    providers
        .iter()
        .map(|provider| {
            let mut provider = provider.clone();
            provider.url = interpolate(&provider.url, variables);
            provider
        })
        .collect()
}
