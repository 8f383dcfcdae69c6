use crate::k8s::{Object, ObjectStore, RouteSource, StoreError};
use crate::resources::common::MANAGER;
use async_trait::async_trait;
use crds::Route;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, ResourceExt};
use std::marker::PhantomData;

/// [`ObjectStore`] backed by the Kubernetes API.
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Object> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(MANAGER.to_string()),
            ..Default::default()
        }
    }
}

fn namespace_of<K: Object>(object: &K) -> Result<String, StoreError> {
    object
        .namespace()
        .ok_or_else(|| StoreError::MissingNamespace(object.name_any()))
}

#[async_trait]
impl<K: Object> ObjectStore<K> for KubeStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn create(&self, object: &K) -> Result<K, StoreError> {
        let namespace = namespace_of(object)?;
        Ok(self
            .api(&namespace)
            .create(&Self::post_params(), object)
            .await?)
    }

    async fn replace(&self, object: &K) -> Result<K, StoreError> {
        let namespace = namespace_of(object)?;
        Ok(self
            .api(&namespace)
            .replace(&object.name_any(), &Self::post_params(), object)
            .await?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        match self
            .api(namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map_err(StoreError::from)
        {
            Ok(_) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list(
        &self,
        namespace: Option<&str>,
        label_selector: &str,
    ) -> Result<Vec<K>, StoreError> {
        let api = match namespace {
            Some(namespace) => self.api(namespace),
            None => Api::all(self.client.clone()),
        };
        let params = ListParams::default().labels(label_selector);
        Ok(api.list(&params).await?.items)
    }
}

#[async_trait]
impl RouteSource for Api<Route> {
    async fn routes(&self) -> Result<Vec<Route>, StoreError> {
        Ok(self.list(&ListParams::default()).await?.items)
    }
}
