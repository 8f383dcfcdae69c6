use crate::k8s::{Object, ObjectStore, StoreError};
use crds::{HttpProxy, VirtualService};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::fmt;

/// An object whose engine-owned fields can be brought in line with a
/// desired copy without touching fields the cluster owns.
pub trait Managed: Object + PartialEq {
    fn mutate(&mut self, desired: &Self);
}

fn mutate_metadata(live: &mut ObjectMeta, desired: &ObjectMeta) {
    live.labels = desired.labels.clone();
    live.annotations = desired.annotations.clone();
    live.owner_references = desired.owner_references.clone();
}

impl Managed for VirtualService {
    fn mutate(&mut self, desired: &Self) {
        mutate_metadata(&mut self.metadata, &desired.metadata);
        self.spec = desired.spec.clone();
    }
}

impl Managed for HttpProxy {
    fn mutate(&mut self, desired: &Self) {
        mutate_metadata(&mut self.metadata, &desired.metadata);
        self.spec = desired.spec.clone();
    }
}

impl Managed for Service {
    // clusterIP, ipFamilies and the rest of the spec are assigned by the cluster
    fn mutate(&mut self, desired: &Self) {
        mutate_metadata(&mut self.metadata, &desired.metadata);
        let desired = desired.spec.as_ref();
        let spec = self.spec.get_or_insert_with(Default::default);
        spec.selector = desired.and_then(|s| s.selector.clone());
        spec.ports = desired.and_then(|s| s.ports.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Unchanged => "unchanged",
        })
    }
}

/// Creates `desired` if it does not exist, otherwise mutates the live
/// object and writes it back when anything changed. A concurrent create is
/// treated as an existing object.
pub async fn create_or_update<K: Managed>(
    store: &dyn ObjectStore<K>,
    desired: &K,
) -> Result<Outcome, StoreError> {
    let namespace = desired
        .namespace()
        .ok_or_else(|| StoreError::MissingNamespace(desired.name_any()))?;
    let name = desired.name_any();

    let live = match store.get(&namespace, &name).await? {
        Some(live) => live,
        None => match store.create(desired).await {
            Ok(_) => return Ok(Outcome::Created),
            Err(StoreError::AlreadyExists(_)) => store
                .get(&namespace, &name)
                .await?
                .ok_or_else(|| StoreError::Conflict(format!("{}/{}", namespace, name)))?,
            Err(e) => return Err(e),
        },
    };

    let mut updated = live.clone();
    updated.mutate(desired);
    if updated == live {
        return Ok(Outcome::Unchanged);
    }
    store.replace(&updated).await?;
    Ok(Outcome::Updated)
}

pub fn kind<K: Resource<DynamicType = ()>>() -> String {
    K::kind(&()).into_owned()
}
