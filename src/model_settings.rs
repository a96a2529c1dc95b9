use crate::storage::{read_json, write_json_atomic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use subtrends_core::CoreError;
use tracing::{debug, info};

/// Tenant used by the command line.
pub const DEFAULT_TENANT: &str = "default";

const MODEL_PREFIX: &str = "claude-";

/// Preferred model per tenant, persisted as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelSettings {
    models: BTreeMap<String, String>,
}

impl ModelSettings {
    /// A missing file yields empty settings.
    pub async fn load(path: &Path) -> Result<Self, CoreError> {
        let settings: ModelSettings = read_json(path).await?;
        debug!("Loaded {} model preferences from {:?}", settings.models.len(), path);
        Ok(settings)
    }

    pub fn get(&self, tenant: &str) -> Option<&str> {
        self.models.get(tenant).map(String::as_str)
    }

    pub fn model_for<'a>(&'a self, tenant: &str, default: &'a str) -> &'a str {
        self.get(tenant).unwrap_or(default)
    }

    pub fn set(&mut self, tenant: &str, model: &str) -> Result<(), CoreError> {
        let model = validate_model(model)?;
        self.models.insert(tenant.to_string(), model.to_string());
        Ok(())
    }

    pub async fn save(&self, path: &Path) -> Result<(), CoreError> {
        write_json_atomic(path, self).await?;
        info!("Saved model preferences to {:?}", path);
        Ok(())
    }
}

/// Trims `model` and checks it names a Claude model.
pub fn validate_model(model: &str) -> Result<&str, CoreError> {
    let model = model.trim();
    if !model.starts_with(MODEL_PREFIX) || model.len() == MODEL_PREFIX.len() {
        return Err(CoreError::InvalidInput {
            message: format!(
                "model '{}' is not supported, expected a name starting with '{}'",
                model, MODEL_PREFIX
            ),
        });
    }
    Ok(model)
}
