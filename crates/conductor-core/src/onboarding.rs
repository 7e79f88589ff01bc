//! First-run setup: pick a model, supply its key, pick a project directory.
//!
//! The form only validates and stores credentials. Submitting it yields the
//! `create` event to send to the controller.

use std::fmt;

use thiserror::Error;

use crate::credentials::{CredentialError, CredentialStore, ModelOption};
use crate::session::{AgentConfig, SessionEvent};

/// A field that still has to be filled in before the session can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingField {
    Model,
    ApiKey,
    FolderPath,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingField::Model => write!(f, "model"),
            MissingField::ApiKey => write!(f, "API key"),
            MissingField::FolderPath => write!(f, "project folder"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OnboardingError {
    #[error("Missing {}", join_fields(.0))]
    Incomplete(Vec<MissingField>),

    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

fn join_fields(fields: &[MissingField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The saved model and key, if onboarding already happened.
///
/// Returns `None` when onboarding is needed.
pub fn load_saved_setup(
    store: &dyn CredentialStore,
) -> Result<Option<AgentConfig>, CredentialError> {
    if !store.has_encrypted_data()? {
        return Ok(None);
    }
    let Some(model) = store.use_model_name()? else {
        return Ok(None);
    };
    Ok(store
        .get_api_key(&model)?
        .map(|key| AgentConfig::new(model, key)))
}

/// State of the onboarding form.
pub struct OnboardingForm<'a> {
    store: &'a dyn CredentialStore,
    model: Option<ModelOption>,
    api_key: String,
    key_saved: bool,
    folder_path: String,
}

impl<'a> OnboardingForm<'a> {
    pub fn new(store: &'a dyn CredentialStore) -> Self {
        Self {
            store,
            model: None,
            api_key: String::new(),
            key_saved: false,
            folder_path: String::new(),
        }
    }

    /// Select a model and load any key saved for it.
    pub fn select_model(&mut self, model: ModelOption) -> Result<(), CredentialError> {
        let saved = self.store.get_api_key(&model.value)?;
        self.key_saved = saved.is_some();
        self.api_key = saved.unwrap_or_default();
        self.model = Some(model);
        Ok(())
    }

    /// Returns false if the key is locked because one is already saved.
    pub fn set_api_key(&mut self, key: impl Into<String>) -> bool {
        if self.key_saved {
            return false;
        }
        self.api_key = key.into();
        true
    }

    pub fn set_folder_path(&mut self, path: impl Into<String>) {
        self.folder_path = path.into();
    }

    pub fn model(&self) -> Option<&ModelOption> {
        self.model.as_ref()
    }

    pub fn folder_path(&self) -> &str {
        &self.folder_path
    }

    /// A saved key exists for the selected model.
    pub fn is_key_locked(&self) -> bool {
        self.key_saved
    }

    pub fn missing_fields(&self) -> Vec<MissingField> {
        let mut missing = Vec::new();
        if self.model.is_none() {
            missing.push(MissingField::Model);
        }
        if self.api_key.is_empty() && !self.key_saved {
            missing.push(MissingField::ApiKey);
        }
        if self.folder_path.is_empty() {
            missing.push(MissingField::FolderPath);
        }
        missing
    }

    pub fn can_start(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Store the key and preferred model, then build the `create` event.
    pub fn submit(&self) -> Result<SessionEvent, OnboardingError> {
        let missing = self.missing_fields();
        let model = match &self.model {
            Some(model) if missing.is_empty() => model,
            _ => return Err(OnboardingError::Incomplete(missing)),
        };

        self.store.add_api_key(&model.value, &self.api_key, false)?;
        self.store.set_use_model_name(&model.value, false)?;
        log::info!("Onboarding complete for model {}", model.value);

        Ok(SessionEvent::create(
            self.folder_path.clone(),
            AgentConfig::new(model.value.clone(), self.api_key.clone()),
        ))
    }
}

// ============================================================================
// TESTS
// ============================================================================
