//! Converges live ingress objects and backend Services to the set
//! synthesized from the current Routes.

pub mod apply;

use crate::k8s::watcher::ShutdownWatch;
use crate::k8s::{ObjectStore, RouteSource, StoreError};
use crate::resources::common::{self, FQDN_ANNOTATION};
use crate::resources::{GroupError, Renderer, Synthesizer};
use crate::snapshot::{RouteSnapshot, SnapshotRepo};
use apply::{create_or_update, kind, Managed, Outcome};
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::mpsc;

/// A failed write, or a failed listing when `name` is empty.
#[derive(Debug)]
pub struct ApplyFailure {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub error: StoreError,
}

/// What one pass did. Failures are retried by the next pass.
#[derive(Debug, Default)]
pub struct Summary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub group_errors: Vec<GroupError>,
    pub failures: Vec<ApplyFailure>,
}

impl Summary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.group_errors.is_empty() && self.failures.is_empty()
    }
}

pub struct Reconciler<R: Renderer> {
    synthesizer: Synthesizer<R>,
    routes: Arc<dyn RouteSource>,
    ingresses: Arc<dyn ObjectStore<R::Object>>,
    services: Arc<dyn ObjectStore<Service>>,
    snapshots: Arc<SnapshotRepo>,
    namespace: Option<String>,
}

impl<R: Renderer> Reconciler<R>
where
    R::Object: Managed,
{
    pub fn new(
        synthesizer: Synthesizer<R>,
        routes: Arc<dyn RouteSource>,
        ingresses: Arc<dyn ObjectStore<R::Object>>,
        services: Arc<dyn ObjectStore<Service>>,
        snapshots: Arc<SnapshotRepo>,
        namespace: Option<String>,
    ) -> Self {
        Self {
            synthesizer,
            routes,
            ingresses,
            services,
            snapshots,
            namespace,
        }
    }

    /// Runs one reconciliation pass over every Route in scope.
    ///
    /// Only a failure to list Routes aborts the pass. Validation errors
    /// leave the affected hostname's live object untouched, and a failed
    /// write of one object does not stop the others.
    pub async fn reconcile(&self) -> Result<Summary, StoreError> {
        let routes: Vec<_> = self
            .routes
            .routes()
            .await?
            .into_iter()
            .filter(|route| route.metadata.deletion_timestamp.is_none())
            .collect();
        debug!("Reconciling {} routes", routes.len());

        let mut summary = Summary::default();

        let synthesis = self.synthesizer.synthesize(&routes);
        for error in &synthesis.errors {
            warn!("{}", error);
        }
        let failed_fqdns = synthesis.failed_fqdns();

        let mut desired_ingresses = HashSet::new();
        for object in &synthesis.objects {
            desired_ingresses.insert(key(object));
            self.apply(self.ingresses.as_ref(), object, &mut summary).await;
        }
        self.prune(self.ingresses.as_ref(), &desired_ingresses, &mut summary, |live| {
            live.annotations()
                .get(FQDN_ANNOTATION)
                .is_some_and(|fqdn| failed_fqdns.contains(fqdn.as_str()))
        })
        .await;

        let mut desired_services = HashSet::new();
        for route in &routes {
            for service in self.synthesizer.synthesize_services(route) {
                desired_services.insert(key(&service));
                self.apply(self.services.as_ref(), &service, &mut summary).await;
            }
        }
        self.prune(self.services.as_ref(), &desired_services, &mut summary, |_| false)
            .await;

        summary.group_errors = synthesis.errors;
        self.snapshots.put(RouteSnapshot::new(routes));
        Ok(summary)
    }

    async fn apply<K: Managed>(&self, store: &dyn ObjectStore<K>, desired: &K, summary: &mut Summary) {
        let namespace = desired.namespace().unwrap_or_default();
        let name = desired.name_any();
        match create_or_update(store, desired).await {
            Ok(outcome) => {
                if outcome == Outcome::Unchanged {
                    debug!("{} {}/{} has been {}", kind::<K>(), namespace, name, outcome);
                } else {
                    info!("{} {}/{} has been {}", kind::<K>(), namespace, name, outcome);
                }
                summary.record(outcome);
            }
            Err(error) => {
                if error.is_retryable() {
                    warn!("Unable to apply {} {}/{}: {}", kind::<K>(), namespace, name, error);
                } else {
                    error!("Unable to apply {} {}/{}: {}", kind::<K>(), namespace, name, error);
                }
                summary.failures.push(ApplyFailure {
                    kind: kind::<K>(),
                    namespace,
                    name,
                    error,
                });
            }
        }
    }

    /// Deletes managed objects that are no longer desired, unless `keep`
    /// holds for them.
    async fn prune<K: Managed>(
        &self,
        store: &dyn ObjectStore<K>,
        desired: &HashSet<(String, String)>,
        summary: &mut Summary,
        keep: impl Fn(&K) -> bool,
    ) {
        let live = match store
            .list(self.namespace.as_deref(), &common::managed_selector())
            .await
        {
            Ok(live) => live,
            Err(error) => {
                error!("Unable to list managed {} objects: {}", kind::<K>(), error);
                summary.failures.push(ApplyFailure {
                    kind: kind::<K>(),
                    namespace: self.namespace.clone().unwrap_or_default(),
                    name: String::new(),
                    error,
                });
                return;
            }
        };

        for object in live {
            let (namespace, name) = key(&object);
            if desired.contains(&(namespace.clone(), name.clone())) || keep(&object) {
                continue;
            }
            match store.delete(&namespace, &name).await {
                Ok(()) => {
                    info!("{} {}/{} has been deleted", kind::<K>(), namespace, name);
                    summary.deleted += 1;
                }
                Err(error) => {
                    error!("Unable to delete {} {}/{}: {}", kind::<K>(), namespace, name, error);
                    summary.failures.push(ApplyFailure {
                        kind: kind::<K>(),
                        namespace,
                        name,
                        error,
                    });
                }
            }
        }
    }
}

fn key<K: ResourceExt>(object: &K) -> (String, String) {
    (object.namespace().unwrap_or_default(), object.name_any())
}

/// Runs a pass for every trigger and on every resync tick until shutdown.
pub async fn run<R: Renderer>(
    reconciler: Arc<Reconciler<R>>,
    mut triggers: mpsc::Receiver<()>,
    resync: Duration,
    mut shutdown: ShutdownWatch,
) where
    R::Object: Managed,
{
    info!("Starting route reconciliation loop, resyncing every {:?}", resync);
    let mut resync = tokio::time::interval(resync);
    resync.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        select! {
            _ = shutdown.changed() => {
                info!("Stopping route reconciliation loop");
                break;
            }
            _ = resync.tick() => debug!("Periodic resync"),
            trigger = triggers.recv() => {
                if trigger.is_none() {
                    info!("Reconciliation trigger channel closed");
                    break;
                }
            }
        }

        match reconciler.reconcile().await {
            Ok(summary) if summary.is_clean() => info!(
                "Reconciliation pass finished: {} created, {} updated, {} unchanged, {} deleted",
                summary.created, summary.updated, summary.unchanged, summary.deleted
            ),
            Ok(summary) => warn!(
                "Reconciliation pass finished with {} invalid hostnames and {} failed objects: {} created, {} updated, {} unchanged, {} deleted",
                summary.group_errors.len(),
                summary.failures.len(),
                summary.created,
                summary.updated,
                summary.unchanged,
                summary.deleted
            ),
            Err(e) => error!("Unable to list routes, skipping reconciliation pass: {}", e),
        }
    }
}
