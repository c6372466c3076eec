use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<()>;
    fn to_manifest(&self) -> ConfigManifest;
}

/// Self-description of a configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigManifest {
    pub section: String,
    pub fields: Vec<FieldManifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldManifest {
    pub name: String,
    pub field_type: String,
    pub default: serde_json::Value,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub description: String,
}

impl FieldManifest {
    pub fn integer(name: &str, default: impl Into<serde_json::Value>, min: f64, description: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: "integer".to_string(),
            default: default.into(),
            min: Some(min),
            max: None,
            description: description.to_string(),
        }
    }

    pub fn float(name: &str, default: f64, min: Option<f64>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: "float".to_string(),
            default: serde_json::json!(default),
            min,
            max: None,
            description: description.to_string(),
        }
    }

    pub fn text(name: &str, default: impl Into<serde_json::Value>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: "string".to_string(),
            default: default.into(),
            min: None,
            max: None,
            description: description.to_string(),
        }
    }
}
