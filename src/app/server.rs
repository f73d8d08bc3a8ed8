//! Runtime bootstrap: builds the tokio runtime, wires the Pooler, Router
//! and Periodic tasks together over a shared route pool, and drives them
//! until a shutdown signal arrives.

use std::sync::Arc;

use log::{error, info};
use parking_lot::Mutex;
use tokio::runtime::Builder;
use tokio::sync::{mpsc, watch};

use crate::app::args::Args;
use crate::config::Config;
use crate::periodic::Periodic;
use crate::pool::{RouteId, RoutePolicy, RoutePool};
use crate::pooler::{NewClient, Pooler, PoolerConfig};
use crate::prometheus::start_prometheus_server;
use crate::router::{DefaultRouteConfig, Router, RouterConfig, StaticRouteConfig};

pub fn run_server(_args: Args, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = Builder::new_multi_thread();
    if config.general.worker_threads > 0 {
        builder.worker_threads(config.general.worker_threads);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Published for any future reload path or admin introspection; the
    // components below are wired from the same `config` value directly
    // rather than re-reading the global, per the core's explicit-context
    // threading (see DESIGN.md).
    crate::config::set(config.clone());

    let route_pool = Arc::new(Mutex::new(RoutePool::new()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (task_queue_tx, mut task_queue_rx) = mpsc::channel::<NewClient>(1024);

    let pooler = Pooler::new(
        PoolerConfig {
            host: config.general.host.clone(),
            port: config.general.port,
            backlog: config.general.backlog,
            nodelay: config.general.nodelay,
            keepalive_secs: config.general.keepalive,
            readahead: config.general.readahead,
        },
        task_queue_tx,
        shutdown_rx.clone(),
    );

    let listener = match pooler.bind().await {
        Ok(listener) => listener,
        Err(err) => {
            error!("{err}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    let (router, router_handle) = Router::new(
        router_config(&config),
        route_pool.clone(),
        shutdown_rx.clone(),
    );
    let periodic = Periodic::new(
        route_pool.clone(),
        config.general.log_statistics,
        shutdown_rx.clone(),
    );

    let router_task = tokio::spawn(router.run());
    let periodic_task = tokio::spawn(periodic.run());
    let pooler_task = tokio::spawn(pooler.run(listener));

    // Per-client protocol relay is out of scope for the core: this task
    // only keeps the Pooler's queue draining and records arrivals. The
    // RouterHandle is dropped with it once workers exist to hold it.
    let intake_task = tokio::spawn(async move {
        let _router_handle = router_handle;
        while let Some(client) = task_queue_rx.recv().await {
            info!("accepted client {} from {}", client.id, client.peer_addr);
        }
    });

    let metrics_port = config.general.port as u32 + 1000;
    tokio::spawn(start_prometheus_server(
        format!("0.0.0.0:{metrics_port}"),
        route_pool.clone(),
    ));

    install_shutdown_handler(shutdown_tx);

    let _ = tokio::join!(router_task, periodic_task, pooler_task, intake_task);
    Ok(())
}

fn router_config(config: &Config) -> RouterConfig {
    let mut static_routes = Vec::new();
    for (database, route) in &config.routes {
        let policy = RoutePolicy {
            ttl_secs: route.pool_ttl.as_secs(),
            pool_size: route.pool_size,
            kind: crate::pool::RouteKind::Static,
        };
        for user in &route.users {
            static_routes.push(StaticRouteConfig {
                id: RouteId::new(database.clone(), user.clone()),
                upstream_host: route.upstream_host.clone(),
                upstream_port: route.upstream_port,
                policy,
            });
        }
    }

    let default_route = config
        .general
        .default_route
        .as_ref()
        .filter(|d| d.enabled)
        .map(|d| DefaultRouteConfig {
            upstream_host: d.upstream_host.clone(),
            upstream_port: d.upstream_port,
            policy: RoutePolicy {
                ttl_secs: d.pool_ttl.as_secs(),
                pool_size: d.pool_size,
                kind: crate::pool::RouteKind::Dynamic,
            },
        });

    RouterConfig {
        static_routes,
        default_route,
    }
}

#[cfg(unix)]
fn install_shutdown_handler(shutdown_tx: watch::Sender<bool>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut sigint =
            signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }
        shutdown_tx.send(true).ok();
    });
}

#[cfg(not(unix))]
fn install_shutdown_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received ctrl-c, shutting down");
        shutdown_tx.send(true).ok();
    });
}
