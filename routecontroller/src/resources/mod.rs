//! Synthesis of ingress objects and backend services from Routes.
//!
//! Routes are grouped by hostname, each group is validated and ordered
//! once, and the resulting [`FqdnGroup`] is handed to a [`Renderer`] that
//! produces the data-plane specific object (an Istio VirtualService or a
//! Contour HTTPProxy). Validation and ordering never live in a renderer.

pub mod common;
pub mod http_proxy;
pub mod service;
pub mod virtual_service;
pub mod weights;

use crate::k8s::Object;
use common::Labels;
use crds::{Route, RouteDestination, ORG_GUID_LABEL, SPACE_GUID_LABEL};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use log::warn;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Backend used for a route with no destinations so the rule stays valid.
pub const PLACEHOLDER_DESTINATION: &str = "no-destinations";

pub const APP_ID_HEADER: &str = "CF-App-Id";
pub const SPACE_ID_HEADER: &str = "CF-Space-Id";
pub const ORG_ID_HEADER: &str = "CF-Organization-Id";
pub const PROCESS_TYPE_HEADER: &str = "CF-App-Process-Type";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("route guid {first} and route guid {other} disagree on whether or not the domain is internal")]
    InternalMismatch { first: String, other: String },

    #[error("route guid {first} and route guid {other} share the same FQDN but have different namespaces")]
    NamespaceMismatch { first: String, other: String },

    #[error("invalid destinations for route {route}: weights must be set on all or none")]
    PartialWeights { route: String },

    #[error("invalid destinations for route {route}: weights must sum up to 100")]
    WeightSum { route: String },

    #[error("route {route} reached weight inference without destinations")]
    NoDestinations { route: String },
}

/// A validation failure that prevented one hostname from being synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to synthesize ingress for {fqdn}: {source}")]
pub struct GroupError {
    pub fqdn: String,
    #[source]
    pub source: SynthesisError,
}

#[derive(Debug, Clone)]
pub struct Synthesis<T> {
    pub objects: Vec<T>,
    pub errors: Vec<GroupError>,
}

impl<T> Synthesis<T> {
    pub fn failed_fqdns(&self) -> HashSet<&str> {
        self.errors.iter().map(|e| e.fqdn.as_str()).collect()
    }
}

/// A validated hostname with its rules in match-priority order.
#[derive(Debug)]
pub struct FqdnGroup<'a> {
    pub fqdn: &'a str,
    pub namespace: Option<String>,
    pub internal: bool,
    pub rules: Vec<Rule<'a>>,
}

impl FqdnGroup<'_> {
    pub fn owner_references(&self) -> Vec<OwnerReference> {
        self.rules
            .iter()
            .map(|rule| common::route_owner_ref(rule.route))
            .collect()
    }
}

#[derive(Debug)]
pub struct Rule<'a> {
    pub route: &'a Route,
    /// Path prefix to match; `None` matches every path.
    pub path: Option<&'a str>,
    pub backends: Backends<'a>,
}

#[derive(Debug)]
pub enum Backends<'a> {
    Weighted(Vec<Backend<'a>>),
    Placeholder,
}

#[derive(Debug)]
pub struct Backend<'a> {
    pub destination: &'a RouteDestination,
    pub service_name: String,
    pub weight: i32,
    pub headers: Vec<(&'static str, String)>,
}

impl<'a> Backend<'a> {
    fn new(route: &Route, destination: &'a RouteDestination, weight: i32) -> Self {
        Self {
            destination,
            service_name: common::service_name(destination),
            weight,
            headers: vec![
                (APP_ID_HEADER, destination.app.guid.clone()),
                (SPACE_ID_HEADER, route.label(SPACE_GUID_LABEL).to_string()),
                (ORG_ID_HEADER, route.label(ORG_GUID_LABEL).to_string()),
                (PROCESS_TYPE_HEADER, destination.app.process.process_type.clone()),
            ],
        }
    }
}

/// Turns a validated [`FqdnGroup`] into a data-plane specific object.
pub trait Renderer: Clone + Send + Sync + 'static {
    type Object: Object + PartialEq;

    /// Prefix of the hashed object name.
    const NAME_PREFIX: &'static str;

    /// Whether explicit destination weights must add up to 100.
    const REQUIRE_WEIGHT_SUM: bool;

    fn render(&self, group: &FqdnGroup<'_>, metadata: ObjectMeta) -> Self::Object;
}

#[derive(Clone)]
pub struct Synthesizer<R> {
    renderer: R,
    labels: Labels,
}

impl<R: Renderer> Synthesizer<R> {
    pub fn new(renderer: R, labels: Labels) -> Self {
        Self { renderer, labels }
    }

    pub fn with_labels(&self, labels: Labels) -> Self {
        Self {
            renderer: self.renderer.clone(),
            labels,
        }
    }

    pub fn object_name(fqdn: &str) -> String {
        common::ingress_name(R::NAME_PREFIX, fqdn)
    }

    /// Desired ingress objects for `routes`, one per valid hostname, in
    /// hostname order. Invalid hostnames are reported and skipped.
    pub fn synthesize(&self, routes: &[Route]) -> Synthesis<R::Object> {
        let groups = common::group_by_fqdn(routes);
        let mut synthesis = Synthesis {
            objects: Vec::with_capacity(groups.len()),
            errors: Vec::new(),
        };

        for fqdn in common::sorted_fqdns(&groups) {
            match build_group(fqdn, groups[fqdn].clone(), R::REQUIRE_WEIGHT_SUM) {
                Ok(Some(group)) => {
                    let metadata = self.metadata(&group);
                    synthesis.objects.push(self.renderer.render(&group, metadata));
                }
                Ok(None) => {}
                Err(source) => synthesis.errors.push(GroupError {
                    fqdn: fqdn.to_string(),
                    source,
                }),
            }
        }
        synthesis
    }

    pub fn synthesize_services(&self, route: &Route) -> Vec<Service> {
        service::build(route, &self.labels)
    }

    fn metadata(&self, group: &FqdnGroup<'_>) -> ObjectMeta {
        ObjectMeta {
            name: Some(Self::object_name(group.fqdn)),
            namespace: group.namespace.clone(),
            labels: Some(common::clone_labels(&self.labels)),
            annotations: Some(BTreeMap::from([(
                common::FQDN_ANNOTATION.to_string(),
                group.fqdn.to_string(),
            )])),
            owner_references: Some(group.owner_references()),
            ..Default::default()
        }
    }
}

/// Validates and orders the routes of one hostname. A weight error on any
/// route fails the whole hostname.
fn build_group<'a>(
    fqdn: &'a str,
    mut routes: Vec<&'a Route>,
    require_weight_sum: bool,
) -> Result<Option<FqdnGroup<'a>>, SynthesisError> {
    weights::validate_routes_for_fqdn(&routes)?;
    common::sort_routes(&mut routes);

    let Some(first) = routes.first().copied() else {
        return Ok(None);
    };
    let sole = routes.len() == 1;

    let mut rules = Vec::with_capacity(routes.len());
    for route in routes {
        let destinations: Vec<_> = common::materialized(route).collect();
        let backends = if !destinations.is_empty() {
            let weights = weights::resolve_weights(route, require_weight_sum)?;
            Backends::Weighted(
                destinations
                    .into_iter()
                    .zip(weights)
                    .map(|(destination, weight)| Backend::new(route, destination, weight))
                    .collect(),
            )
        } else if sole {
            Backends::Placeholder
        } else {
            continue;
        };

        rules.push(Rule {
            route,
            path: Some(route.spec.path.as_str()).filter(|path| !path.is_empty()),
            backends,
        });
    }

    if rules.is_empty() {
        return Ok(None);
    }

    Ok(Some(FqdnGroup {
        fqdn,
        namespace: first.namespace(),
        internal: first.spec.domain.internal,
        rules,
    }))
}

/// Renders desired children as JSON for callers that do not apply them
/// directly, such as the sync webhook.
pub trait ChildRenderer: Send + Sync {
    fn render_children(
        &self,
        routes: &[Route],
        labels: &Labels,
    ) -> Result<Vec<serde_json::Value>, serde_json::Error>;
}

impl<R: Renderer> ChildRenderer for Synthesizer<R> {
    fn render_children(
        &self,
        routes: &[Route],
        labels: &Labels,
    ) -> Result<Vec<serde_json::Value>, serde_json::Error> {
        let synthesizer = self.with_labels(labels.clone());
        let synthesis = synthesizer.synthesize(routes);
        for error in &synthesis.errors {
            warn!("{}", error);
        }

        let mut children = synthesis
            .objects
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        for route in routes {
            for service in synthesizer.synthesize_services(route) {
                children.push(serde_json::to_value(&service)?);
            }
        }
        Ok(children)
    }
}
