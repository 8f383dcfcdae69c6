use crate::k8s::Object;
use anyhow::anyhow;
use crds::Route;
use futures_util::future::BoxFuture;
use futures_util::TryStreamExt;
use kube::runtime::watcher::Event;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, ResourceExt};
use log::{debug, error, info};
use std::pin::pin;
use tokio::select;
use tokio::sync::{mpsc, watch};

pub type ShutdownWatch = watch::Receiver<bool>;

pub struct Service<F>
where
    F: Fn(Route) -> BoxFuture<'static, Result<(), anyhow::Error>> + Send + Sync + 'static,
{
    routes: Api<Route>,
    update: F,
    failure: mpsc::Sender<anyhow::Error>,
}

impl<F> Service<F>
where
    F: Fn(Route) -> BoxFuture<'static, Result<(), anyhow::Error>> + Send + Sync + 'static,
{
    pub fn new(routes: Api<Route>, update: F, failure_bus: mpsc::Sender<anyhow::Error>) -> Self {
        Self {
            routes,
            update,
            failure: failure_bus,
        }
    }

    pub async fn start(&self, mut shutdown: ShutdownWatch) {
        info!("Starting Kubernetes Route watch service");

        let mut watch = create(self.routes.clone(), watcher::Config::default());

        loop {
            select! {
                _ = shutdown.changed() => {
                    info!("Stopping Kubernetes Route watch service");
                    break;
                }
                event = watch.recv() => match event {
                    Some(event) => {
                        debug!("Received a watch event");

                        let routes = match event {
                            Event::Deleted(route) => vec![route],
                            Event::Applied(route) => vec![route],
                            Event::Restarted(routes) => routes,
                        };

                        for route in routes {
                            if let Err(e) = (self.update)(route).await {
                                error!("Error running watch service update: {}", e);
                            }
                        }
                    },
                    None => {
                        if let Err(e) = self
                            .failure
                            .send(anyhow!("Kubernetes Route watch stream ended"))
                            .await
                        {
                            error!("Error sending error result failure channel: {}", e);
                        }
                        break;
                    }
                }
            }
        }
    }
}

pub fn create<T: Object>(api: Api<T>, config: watcher::Config) -> mpsc::Receiver<Event<T>> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let stream = watcher(api, config).default_backoff();
        let mut stream = pin!(stream);
        loop {
            match stream.try_next().await {
                Ok(Some(event)) => {
                    if tx.send(event).await.is_err() {
                        debug!("Watch event receiver dropped, stopping watch");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Unable to read from stream: {}", e);
                }
            }
        }
    });
    rx
}

/// Watch update that requests a reconciliation pass. Triggers are coalesced:
/// while a pass is already pending further changes are folded into it.
pub fn trigger(
    passes: mpsc::Sender<()>,
) -> impl Fn(Route) -> BoxFuture<'static, Result<(), anyhow::Error>> + Send + Sync + 'static {
    move |route| {
        let passes = passes.clone();
        Box::pin(async move {
            debug!(
                "Route {}/{} changed, requesting reconciliation",
                route.namespace().unwrap_or_default(),
                route.name_any()
            );
            match passes.try_send(()) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(())) => Ok(()),
                Err(mpsc::error::TrySendError::Closed(())) => {
                    Err(anyhow!("reconciliation loop is no longer running"))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::tests::route;

    #[tokio::test]
    async fn trigger_coalesces_pending_passes() {
        let (tx, mut rx) = mpsc::channel(1);
        let update = trigger(tx);

        update(route("r1", "h", "d.com", "", vec![])).await.unwrap();
        update(route("r2", "h", "d.com", "", vec![])).await.unwrap();

        assert_eq!(rx.recv().await, Some(()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn trigger_fails_once_loop_stops() {
        let (tx, rx) = mpsc::channel(1);
        let update = trigger(tx);
        drop(rx);

        assert!(update(route("r1", "h", "d.com", "", vec![])).await.is_err());
    }
}
