use crate::api::ApiState;
use crate::config::{Config, Provider};
use crate::k8s::store::KubeStore;
use crate::reconciler::apply::Managed;
use crate::reconciler::Reconciler;
use crate::resources::http_proxy::HttpProxyRenderer;
use crate::resources::virtual_service::VirtualServiceRenderer;
use crate::resources::{Renderer, Synthesizer};
use crate::snapshot::SnapshotRepo;
use anyhow::anyhow;
use clap::Parser;
use crds::Route;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch};

mod api;
mod config;
mod k8s;
mod reconciler;
mod resources;
mod snapshot;

#[derive(Parser, Debug)]
#[command(version, about = "Keeps ingress objects in sync with Cloud Foundry Routes", long_about = None)]
struct CliArgs {
    #[arg(short, long, default_value = "/etc/routecontroller/config.yaml")]
    config_file: String,

    #[arg(long, default_value_t = log::LevelFilter::Info)]
    log_level: log::LevelFilter,
}

#[tokio::main]
async fn main() {
    let cli_args = CliArgs::parse();
    env_logger::builder()
        .filter_level(cli_args.log_level)
        .init();

    if let Err(e) = run(cli_args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), anyhow::Error> {
    let config = config::load(&args.config_file)?;
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow!("Unable to create Kubernetes client: {}", e))?;

    match config.provider {
        Provider::Istio => {
            let renderer = VirtualServiceRenderer::new(config.istio.gateways.clone());
            start(config, client, renderer).await
        }
        Provider::Contour => {
            let renderer = HttpProxyRenderer::new(
                config.contour.tls_secret_name.clone(),
                config.contour.https_only,
            );
            start(config, client, renderer).await
        }
    }
}

async fn start<R: Renderer>(config: Config, client: Client, renderer: R) -> Result<(), anyhow::Error>
where
    R::Object: Managed,
{
    let routes: Api<Route> = match &config.namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };
    let snapshots = Arc::new(SnapshotRepo::default());
    let synthesizer = Synthesizer::new(renderer, config.labels.clone());
    let reconciler = Arc::new(Reconciler::new(
        synthesizer.clone(),
        Arc::new(routes.clone()),
        Arc::new(KubeStore::<R::Object>::new(client.clone())),
        Arc::new(KubeStore::<Service>::new(client)),
        snapshots.clone(),
        config.namespace.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (watch_failure_tx, mut watch_failure_rx) = mpsc::channel(1);
    let (trigger_tx, trigger_rx) = mpsc::channel(1);

    let watcher = k8s::watcher::Service::new(
        routes,
        k8s::watcher::trigger(trigger_tx),
        watch_failure_tx,
    );
    let api = api::Service::new(
        config.api.port,
        ApiState {
            snapshots,
            children: Arc::new(synthesizer),
        },
    );

    let tasks = vec![
        tokio::spawn({
            let shutdown = shutdown_rx.clone();
            async move { watcher.start(shutdown).await }
        }),
        tokio::spawn({
            let shutdown = shutdown_rx.clone();
            async move { api.start(shutdown).await }
        }),
        tokio::spawn(reconciler::run(
            reconciler,
            trigger_rx,
            Duration::from_secs(config.resync_interval_secs),
            shutdown_rx,
        )),
    ];

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Unable to install SIGTERM handler: {}", e))?;
    let result = select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
            Ok(())
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
            Ok(())
        }
        Some(failure) = watch_failure_rx.recv() => {
            error!("Watcher error: {}", failure);
            Err(failure)
        }
    };

    if shutdown_tx.send(true).is_err() {
        info!("All services already stopped");
    }
    for task in tasks {
        if let Err(e) = task.await {
            error!("Service task failed: {}", e);
        }
    }
    result
}
