//! Model profiles and the catalog the picker chooses from

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named model plus the provider-specific generation options sent with it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Provider model identifier (e.g. "openai/gpt-5")
    pub name: String,
    /// Extra request fields merged into every outbound body for this model
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ModelProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// Built-in catalog, used when the config file names no models
pub fn default_profiles() -> Vec<ModelProfile> {
    [
        "z-ai/glm-4.6",
        "anthropic/claude-sonnet-4.5",
        "google/gemini-2.5-flash-lite-preview-09-2025",
        "openai/gpt-5-nano",
        "openai/chatgpt-4o-latest",
        "openai/gpt-5",
        "deepseek/deepseek-chat-v3.1",
        "deepseek/deepseek-chat-v3-0324:free",
        "google/gemini-2.5-pro",
        "google/gemini-2.5-flash-lite",
        "google/gemma-2-9b-it",
    ]
    .into_iter()
    .map(ModelProfile::new)
    .collect()
}

/// Ordered set of known model profiles
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    profiles: Vec<ModelProfile>,
}

impl ModelCatalog {
    /// Build a catalog; an empty list falls back to the built-in profiles
    pub fn new(profiles: Vec<ModelProfile>) -> Self {
        if profiles.is_empty() {
            tracing::warn!("No model profiles configured, using built-in catalog");
            return Self {
                profiles: default_profiles(),
            };
        }
        Self { profiles }
    }

    pub fn profiles(&self) -> &[ModelProfile] {
        &self.profiles
    }

    pub fn get(&self, name: &str) -> Option<&ModelProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Resolve a persisted selection, falling back to the first profile when
    /// the name is absent or no longer known.
    pub fn resolve(&self, persisted: Option<&str>) -> &ModelProfile {
        if let Some(profile) = persisted.and_then(|name| self.get(name)) {
            return profile;
        }
        if let Some(name) = persisted {
            tracing::info!("Persisted model '{name}' is not in the catalog, using default");
        }
        &self.profiles[0]
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(default_profiles())
    }
}
