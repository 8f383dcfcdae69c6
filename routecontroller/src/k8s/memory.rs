use crate::k8s::{Object, ObjectStore, RouteSource, StoreError};
use async_trait::async_trait;
use crds::Route;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory [`ObjectStore`] that assigns uids and resourceVersions like
/// the API server and rejects stale replaces.
pub struct MemoryStore<K> {
    objects: DashMap<(String, String), K>,
    version: AtomicU64,
    writes: AtomicUsize,
}

impl<K: Object> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: DashMap::new(),
            version: AtomicU64::new(1),
            writes: AtomicUsize::new(0),
        }
    }
}

impl<K: Object> MemoryStore<K> {
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.iter().map(|o| o.key().1.clone()).collect();
        names.sort();
        names
    }

    pub fn find(&self, name: &str) -> Option<K> {
        self.objects
            .iter()
            .find(|o| o.key().1 == name)
            .map(|o| o.value().clone())
    }

    /// Number of successful create, replace and delete calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stores `object` as is, bypassing version checks.
    pub fn insert(&self, object: K) {
        let key = (object.namespace().unwrap_or_default(), object.name_any());
        self.objects.insert(key, object);
    }

    fn stamp(&self, object: &mut K) {
        let version = self.version.fetch_add(1, Ordering::SeqCst);
        object.meta_mut().resource_version = Some(version.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn matches_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
            None => labels.contains_key(term),
        })
}

#[async_trait]
impl<K: Object> ObjectStore<K> for MemoryStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        Ok(self
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .map(|o| o.value().clone()))
    }

    async fn create(&self, object: &K) -> Result<K, StoreError> {
        let namespace = object
            .namespace()
            .ok_or_else(|| StoreError::MissingNamespace(object.name_any()))?;
        match self.objects.entry((namespace, object.name_any())) {
            Entry::Occupied(entry) => Err(StoreError::AlreadyExists(entry.key().1.clone())),
            Entry::Vacant(entry) => {
                let mut created = object.clone();
                created.meta_mut().uid = Some(format!("uid-{}", created.name_any()));
                self.stamp(&mut created);
                entry.insert(created.clone());
                Ok(created)
            }
        }
    }

    async fn replace(&self, object: &K) -> Result<K, StoreError> {
        let key = (object.namespace().unwrap_or_default(), object.name_any());
        let Some(mut live) = self.objects.get_mut(&key) else {
            return Err(StoreError::NotFound(key.1));
        };
        if live.resource_version() != object.resource_version() {
            return Err(StoreError::Conflict(key.1));
        }
        let mut replaced = object.clone();
        self.stamp(&mut replaced);
        *live = replaced.clone();
        Ok(replaced)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        if self
            .objects
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some()
        {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn list(
        &self,
        namespace: Option<&str>,
        label_selector: &str,
    ) -> Result<Vec<K>, StoreError> {
        Ok(self
            .objects
            .iter()
            .filter(|o| namespace.map_or(true, |ns| o.key().0 == ns))
            .filter(|o| matches_selector(o.value().labels(), label_selector))
            .map(|o| o.value().clone())
            .collect())
    }
}

/// A fixed, replaceable set of Routes.
#[derive(Default)]
pub struct StaticRoutes(Mutex<Vec<Route>>);

impl StaticRoutes {
    pub fn new(routes: Vec<Route>) -> Self {
        Self(Mutex::new(routes))
    }

    pub fn set(&self, routes: Vec<Route>) {
        *self.0.lock().unwrap() = routes;
    }
}

#[async_trait]
impl RouteSource for StaticRoutes {
    async fn routes(&self) -> Result<Vec<Route>, StoreError> {
        Ok(self.0.lock().unwrap().clone())
    }
}
