use crate::resources::common::Labels;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Route {
    pub name: String,
    pub namespace: String,
    pub url: String,
    pub destinations: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub parent: Parent,
}

#[derive(Debug, Default, Deserialize)]
pub struct Parent {
    #[serde(default)]
    pub spec: ParentSpec,
}

#[derive(Debug, Default, Deserialize)]
pub struct ParentSpec {
    #[serde(default)]
    pub template: Template,
}

#[derive(Debug, Default, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub metadata: TemplateMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateMetadata {
    #[serde(default)]
    pub labels: Option<Labels>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub children: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
