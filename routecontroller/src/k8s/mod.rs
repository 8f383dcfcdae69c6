use async_trait::async_trait;
use crds::Route;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use thiserror::Error;

#[cfg(test)]
pub mod memory;
pub mod store;
pub mod watcher;

pub trait Object:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + DeserializeOwned
    + Serialize
    + Debug
    + Send
    + Sync
    + 'static
{
}

impl<T> Object for T where
    T: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static
{
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("conflicting update of {0}, will retry")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("object {0} has no namespace")]
    MissingNamespace(String),

    #[error("Kubernetes API error: {0}")]
    Kube(kube::Error),
}

impl StoreError {
    /// Whether the next pass can be expected to succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::AlreadyExists(_) | StoreError::Conflict(_) | StoreError::NotFound(_)
        )
    }
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(response) if response.code == 409 => {
                if response.reason == "AlreadyExists" {
                    StoreError::AlreadyExists(response.message)
                } else {
                    StoreError::Conflict(response.message)
                }
            }
            kube::Error::Api(response) if response.code == 404 => {
                StoreError::NotFound(response.message)
            }
            error => StoreError::Kube(error),
        }
    }
}

/// Namespaced access to live objects of one kind.
#[async_trait]
pub trait ObjectStore<K: Object>: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    async fn create(&self, object: &K) -> Result<K, StoreError>;

    /// Replaces the object; fails with [`StoreError::Conflict`] when its
    /// resourceVersion is stale.
    async fn replace(&self, object: &K) -> Result<K, StoreError>;

    /// Deleting an object that is already gone succeeds.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    async fn list(&self, namespace: Option<&str>, label_selector: &str)
        -> Result<Vec<K>, StoreError>;
}

/// The current set of Routes in scope. A listing is complete or an error.
#[async_trait]
pub trait RouteSource: Send + Sync {
    async fn routes(&self) -> Result<Vec<Route>, StoreError>;
}
