//! Secure-credential collaborator and model catalog.
//!
//! The controller never stores secrets itself. Consumers go through a
//! [`CredentialStore`]; only success, failure and the returned value matter.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync::lock;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    #[error("Credential storage failed: {0}")]
    Storage(String),
}

/// Access to saved API keys and the preferred model.
pub trait CredentialStore: Send + Sync {
    fn get_api_key(&self, model: &str) -> Result<Option<String>, CredentialError>;

    /// Save `secret` for `model`. `refresh` is passed through to the store.
    fn add_api_key(&self, model: &str, secret: &str, refresh: bool) -> Result<(), CredentialError>;

    /// Whether anything has been saved before.
    fn has_encrypted_data(&self) -> Result<bool, CredentialError>;

    /// The model chosen during the last onboarding, if any.
    fn use_model_name(&self) -> Result<Option<String>, CredentialError>;

    fn set_use_model_name(&self, model: &str, refresh: bool) -> Result<(), CredentialError>;
}

/// Process-local [`CredentialStore`]. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    keys: Mutex<HashMap<String, String>>,
    model: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_api_key(&self, model: &str) -> Result<Option<String>, CredentialError> {
        Ok(lock(&self.keys).get(model).cloned())
    }

    fn add_api_key(
        &self,
        model: &str,
        secret: &str,
        _refresh: bool,
    ) -> Result<(), CredentialError> {
        lock(&self.keys).insert(model.to_string(), secret.to_string());
        Ok(())
    }

    fn has_encrypted_data(&self) -> Result<bool, CredentialError> {
        Ok(!lock(&self.keys).is_empty() || lock(&self.model).is_some())
    }

    fn use_model_name(&self) -> Result<Option<String>, CredentialError> {
        Ok(lock(&self.model).clone())
    }

    fn set_use_model_name(&self, model: &str, _refresh: bool) -> Result<(), CredentialError> {
        *lock(&self.model) = Some(model.to_string());
        Ok(())
    }
}

/// An entry of the model catalog. Opaque selection metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOption {
    pub value: String,
    pub company: String,
    pub api_key_url: String,
}

impl ModelOption {
    pub fn new(
        value: impl Into<String>,
        company: impl Into<String>,
        api_key_url: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            company: company.into(),
            api_key_url: api_key_url.into(),
        }
    }
}

/// Models the worker knows how to drive.
pub fn default_models() -> Vec<ModelOption> {
    vec![
        ModelOption::new(
            "claude-3-5-sonnet",
            "Anthropic",
            "https://console.anthropic.com/settings/keys",
        ),
        ModelOption::new(
            "claude-opus",
            "Anthropic",
            "https://console.anthropic.com/settings/keys",
        ),
        ModelOption::new("gpt4-o", "OpenAI", "https://platform.openai.com/api-keys"),
        ModelOption::new("groq", "Groq", "https://console.groq.com/keys"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    mod memory_store {
        use super::*;

        #[test]
        fn empty_store_has_no_data() {
            let store = MemoryCredentialStore::new();
            assert!(!store.has_encrypted_data().unwrap());
            assert_eq!(store.get_api_key("m").unwrap(), None);
            assert_eq!(store.use_model_name().unwrap(), None);
        }

        #[test]
        fn keys_are_per_model() {
            let store = MemoryCredentialStore::new();
            store.add_api_key("a", "key-a", false).unwrap();
            store.add_api_key("b", "key-b", true).unwrap();

            assert_eq!(store.get_api_key("a").unwrap().as_deref(), Some("key-a"));
            assert_eq!(store.get_api_key("b").unwrap().as_deref(), Some("key-b"));
            assert!(store.has_encrypted_data().unwrap());
        }

        #[test]
        fn preferred_model_is_remembered() {
            let store = MemoryCredentialStore::new();
            store.set_use_model_name("claude-opus", false).unwrap();
            assert_eq!(store.use_model_name().unwrap().as_deref(), Some("claude-opus"));
        }
    }

    mod catalog {
        use super::*;

        #[test]
        fn default_models_are_unique() {
            let models = default_models();
            let mut values: Vec<_> = models.iter().map(|m| m.value.as_str()).collect();
            values.sort_unstable();
            values.dedup();
            assert_eq!(values.len(), models.len());
        }

        #[test]
        fn serializes_camel_case() {
            let value = serde_json::to_value(ModelOption::new("m", "Co", "https://x")).unwrap();
            assert_eq!(
                value,
                serde_json::json!({"value": "m", "company": "Co", "apiKeyUrl": "https://x"})
            );
        }
    }
}
