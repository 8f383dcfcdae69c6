use k8s_openapi::serde::{Deserialize, Serialize};
use kube::CustomResource;
use schemars::JsonSchema;
use std::collections::BTreeMap;

/// Label carrying the space guid a Route belongs to.
pub const SPACE_GUID_LABEL: &str = "cloudfoundry.org/space_guid";
/// Label carrying the organization guid a Route belongs to.
pub const ORG_GUID_LABEL: &str = "cloudfoundry.org/org_guid";

#[derive(Debug, Clone, PartialEq, CustomResource, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "networking.cloudfoundry.org",
    version = "v1alpha1",
    kind = "Route",
    doc = "Route is a platform-neutral HTTP routing intent for one hostname and path",
    derive = "PartialEq",
    namespaced
)]
pub struct RouteSpec {
    #[serde(default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default)]
    pub url: String,
    pub domain: RouteDomain,
    #[serde(default)]
    pub destinations: Vec<RouteDestination>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteDomain {
    pub name: String,
    #[serde(default)]
    pub internal: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteDestination {
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
    pub port: Option<i32>,
    pub app: DestinationApp,
    #[serde(default)]
    pub selector: DestinationSelector,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DestinationApp {
    pub guid: String,
    pub process: AppProcess,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AppProcess {
    #[serde(rename = "type")]
    pub process_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl Route {
    /// The hostname this route serves: `host.domain`, or the bare domain
    /// when no host is set.
    pub fn fqdn(&self) -> String {
        if self.spec.host.is_empty() {
            self.spec.domain.name.clone()
        } else {
            format!("{}.{}", self.spec.host, self.spec.domain.name)
        }
    }

    /// Full route URL used to order routes sharing a hostname.
    pub fn url(&self) -> String {
        if self.spec.url.is_empty() {
            format!("{}{}", self.fqdn(), self.spec.path)
        } else {
            self.spec.url.clone()
        }
    }

    pub fn label(&self, key: &str) -> &str {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
            .unwrap_or_default()
    }
}
