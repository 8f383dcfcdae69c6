use crds::{Route, RouteDestination};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use sha2::{Digest, Sha256};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

pub type Labels = BTreeMap<String, String>;

pub const FQDN_ANNOTATION: &str = "cloudfoundry.org/fqdn";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGER: &str = "routecontroller";

/// Groups routes by the hostname they serve. Routes keep their input order
/// within a group; callers sort explicitly.
pub fn group_by_fqdn(routes: &[Route]) -> HashMap<String, Vec<&Route>> {
    let mut groups: HashMap<String, Vec<&Route>> = HashMap::new();
    for route in routes {
        groups.entry(route.fqdn()).or_default().push(route);
    }
    groups
}

pub fn sorted_fqdns<V>(groups: &HashMap<String, V>) -> Vec<&str> {
    let mut fqdns: Vec<&str> = groups.keys().map(String::as_str).collect();
    fqdns.sort_unstable();
    fqdns
}

/// Orders routes by descending URL so that, for routes sharing a prefix,
/// the longest path comes first. Ties are broken by route name.
pub fn sort_routes(routes: &mut [&Route]) {
    routes.sort_by_cached_key(|route| (Reverse(route.url()), route.name_any()));
}

/// Resource name for the ingress object serving `fqdn`.
///
/// Hostnames may be longer than a resource name allows and may contain
/// characters (`*`, unicode) that are not valid in one, so the name is
/// derived from the sha256 digest of the hostname.
pub fn ingress_name(prefix: &str, fqdn: &str) -> String {
    format!("{}{:x}", prefix, Sha256::digest(fqdn.as_bytes()))
}

/// Destinations that have been assigned a port. The rest have no backing
/// Service yet and are left out of ingress objects.
pub fn materialized(route: &Route) -> impl Iterator<Item = &RouteDestination> {
    route.spec.destinations.iter().filter(|d| d.port.is_some())
}

// service names cannot start with a digit
pub fn service_name(destination: &RouteDestination) -> String {
    format!("s-{}", destination.guid)
}

pub fn clone_labels(template: &Labels) -> Labels {
    let mut labels = template.clone();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGER.to_string());
    labels
}

pub fn managed_selector() -> String {
    format!("{}={}", MANAGED_BY_LABEL, MANAGER)
}

pub fn route_owner_ref(route: &Route) -> OwnerReference {
    OwnerReference {
        api_version: Route::api_version(&()).into_owned(),
        kind: Route::kind(&()).into_owned(),
        name: route.name_any(),
        uid: route.uid().unwrap_or_default(),
        ..Default::default()
    }
}
