//! Model registry: the typed catalog of council models.
//!
//! Replaces ad-hoc provider dispatch by model-id lookup with descriptors
//! that carry a provider tag, resolved to a concrete [`ModelClient`] at
//! registration time. Built once at startup and validated there: exactly
//! one chairman, and every provider tag backed by a client.

use crate::ports::model_client::ModelClient;
use council_domain::ModelDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors detected when building a registry
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no models configured")]
    NoModels,

    #[error("no chairman designated")]
    NoChairman,

    #[error("more than one chairman designated: {0} and {1}")]
    MultipleChairmen(String, String),

    #[error("duplicate model id: {0}")]
    DuplicateModel(String),

    #[error("model {model_id} references provider {provider_tag}, which has no client")]
    MissingClient {
        model_id: String,
        provider_tag: String,
    },
}

/// The immutable catalog of known models and their provider clients.
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
    clients: HashMap<String, Arc<dyn ModelClient>>,
    chairman_index: usize,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.models)
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .field("chairman_index", &self.chairman_index)
            .finish()
    }
}

impl ModelRegistry {
    /// Build and validate the registry.
    pub fn new(
        models: Vec<ModelDescriptor>,
        clients: HashMap<String, Arc<dyn ModelClient>>,
    ) -> Result<Self, RegistryError> {
        if models.is_empty() {
            return Err(RegistryError::NoModels);
        }

        let mut chairman_index = None;
        for (index, descriptor) in models.iter().enumerate() {
            if models[..index].iter().any(|d| d.id == descriptor.id) {
                return Err(RegistryError::DuplicateModel(descriptor.id.clone()));
            }
            if !clients.contains_key(&descriptor.provider_tag) {
                return Err(RegistryError::MissingClient {
                    model_id: descriptor.id.clone(),
                    provider_tag: descriptor.provider_tag.clone(),
                });
            }
            if descriptor.is_chairman {
                match chairman_index {
                    None => chairman_index = Some(index),
                    Some(first) => {
                        return Err(RegistryError::MultipleChairmen(
                            models[first].id.clone(),
                            descriptor.id.clone(),
                        ));
                    }
                }
            }
        }

        let chairman_index = chairman_index.ok_or(RegistryError::NoChairman)?;

        Ok(Self {
            models,
            clients,
            chairman_index,
        })
    }

    /// All known models, in configuration order.
    pub fn list_all(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Resolve requested ids to descriptors, preserving request order.
    ///
    /// With `None` or an empty list, returns all models. Unknown ids are
    /// not fatal: they come back in the second element so the caller can
    /// emit warnings.
    pub fn resolve(&self, ids: Option<&[String]>) -> (Vec<ModelDescriptor>, Vec<String>) {
        let Some(ids) = ids.filter(|ids| !ids.is_empty()) else {
            return (self.models.clone(), Vec::new());
        };

        let mut resolved = Vec::new();
        let mut unknown = Vec::new();
        for id in ids {
            match self.models.iter().find(|d| &d.id == id) {
                Some(descriptor) => resolved.push(descriptor.clone()),
                None => unknown.push(id.clone()),
            }
        }
        (resolved, unknown)
    }

    /// Look up one model by id.
    pub fn find(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|d| d.id == id)
    }

    /// The designated synthesis model.
    pub fn chairman(&self) -> &ModelDescriptor {
        &self.models[self.chairman_index]
    }

    /// The client behind a descriptor's provider tag.
    ///
    /// Coverage is validated at construction, so descriptors obtained
    /// from this registry always resolve; a foreign descriptor yields
    /// [`RegistryError::MissingClient`].
    pub fn client_for(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<Arc<dyn ModelClient>, RegistryError> {
        self.clients
            .get(&descriptor.provider_tag)
            .cloned()
            .ok_or_else(|| RegistryError::MissingClient {
                model_id: descriptor.id.clone(),
                provider_tag: descriptor.provider_tag.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::model_client::{
        CompletionRequest, ModelClientError, StreamHandle,
    };
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    // -- Mock ModelClient ------------------------------------------------------

    struct NullClient;

    #[async_trait]
    impl ModelClient for NullClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, ModelClientError> {
            Err(ModelClientError::Other("null".to_string()))
        }

        async fn stream(
            &self,
            _request: CompletionRequest,
            _cancel: CancellationToken,
        ) -> Result<StreamHandle, ModelClientError> {
            Err(ModelClientError::Other("null".to_string()))
        }
    }

    fn clients(tags: &[&str]) -> HashMap<String, Arc<dyn ModelClient>> {
        tags.iter()
            .map(|tag| (tag.to_string(), Arc::new(NullClient) as Arc<dyn ModelClient>))
            .collect()
    }

    fn descriptors() -> Vec<ModelDescriptor> {
        vec![
            ModelDescriptor::new("m1", "openai").chairman(),
            ModelDescriptor::new("m2", "openrouter"),
            ModelDescriptor::new("m3", "openrouter"),
        ]
    }

    // -- Construction validation -----------------------------------------------

    #[test]
    fn builds_with_one_chairman() {
        let registry = ModelRegistry::new(descriptors(), clients(&["openai", "openrouter"])).unwrap();
        assert_eq!(registry.chairman().id, "m1");
        assert_eq!(registry.list_all().len(), 3);
    }

    #[test]
    fn rejects_missing_chairman() {
        let models = vec![ModelDescriptor::new("m1", "openai")];
        let err = ModelRegistry::new(models, clients(&["openai"])).unwrap_err();
        assert!(matches!(err, RegistryError::NoChairman));
    }

    #[test]
    fn rejects_second_chairman() {
        let models = vec![
            ModelDescriptor::new("m1", "openai").chairman(),
            ModelDescriptor::new("m2", "openai").chairman(),
        ];
        let err = ModelRegistry::new(models, clients(&["openai"])).unwrap_err();
        assert!(matches!(err, RegistryError::MultipleChairmen(_, _)));
    }

    #[test]
    fn rejects_unbacked_provider() {
        let err = ModelRegistry::new(descriptors(), clients(&["openai"])).unwrap_err();
        assert!(matches!(err, RegistryError::MissingClient { .. }));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let models = vec![
            ModelDescriptor::new("m1", "openai").chairman(),
            ModelDescriptor::new("m1", "openai"),
        ];
        let err = ModelRegistry::new(models, clients(&["openai"])).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateModel(_)));
    }

    #[test]
    fn rejects_empty_catalog() {
        let err = ModelRegistry::new(vec![], clients(&["openai"])).unwrap_err();
        assert!(matches!(err, RegistryError::NoModels));
    }

    #[test]
    fn client_for_resolves_own_descriptors_only() {
        let registry = ModelRegistry::new(descriptors(), clients(&["openai", "openrouter"])).unwrap();
        let own = registry.list_all()[0].clone();
        assert!(registry.client_for(&own).is_ok());

        let foreign = ModelDescriptor::new("x", "no-such-provider");
        assert!(matches!(
            registry.client_for(&foreign),
            Err(RegistryError::MissingClient { .. })
        ));
    }

    // -- resolve ---------------------------------------------------------------

    #[test]
    fn resolve_none_returns_all_in_order() {
        let registry = ModelRegistry::new(descriptors(), clients(&["openai", "openrouter"])).unwrap();
        let (resolved, unknown) = registry.resolve(None);
        assert_eq!(
            resolved.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            ["m1", "m2", "m3"]
        );
        assert!(unknown.is_empty());
    }

    #[test]
    fn resolve_empty_list_returns_all() {
        let registry = ModelRegistry::new(descriptors(), clients(&["openai", "openrouter"])).unwrap();
        let (resolved, _) = registry.resolve(Some(&[]));
        assert_eq!(resolved.len(), 3);
    }

    #[test]
    fn resolve_preserves_request_order_and_reports_unknown() {
        let registry = ModelRegistry::new(descriptors(), clients(&["openai", "openrouter"])).unwrap();
        let ids = vec!["m3".to_string(), "nope".to_string(), "m1".to_string()];
        let (resolved, unknown) = registry.resolve(Some(&ids));
        assert_eq!(
            resolved.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            ["m3", "m1"]
        );
        assert_eq!(unknown, ["nope"]);
    }
}
