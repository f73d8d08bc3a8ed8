//! Prometheus metrics exporter.
//!
//! A hand-rolled text-exposition endpoint over a raw `TcpListener`, built
//! on the `prometheus` crate's `Registry`, trimmed to the gauges this core
//! actually has data for: per-route client/server counts and the
//! dynamic-route total.

use once_cell::sync::Lazy;
use prometheus::{Gauge, GaugeVec, Opts, Registry};

mod metrics;
mod server;

pub use server::start_prometheus_server;

pub(crate) static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub(crate) static ROUTE_CLIENTS: Lazy<GaugeVec> = Lazy::new(|| {
    let gauge = GaugeVec::new(
        Opts::new(
            "pgroute_route_clients",
            "Clients attached to a route by status ('active' or 'pending'), database and user.",
        ),
        &["status", "database", "user"],
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub(crate) static ROUTE_SERVERS: Lazy<GaugeVec> = Lazy::new(|| {
    let gauge = GaugeVec::new(
        Opts::new(
            "pgroute_route_servers",
            "Upstream servers held by a route by status ('active' or 'idle'), database and user.",
        ),
        &["status", "database", "user"],
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub(crate) static DYNAMIC_ROUTES: Lazy<Gauge> = Lazy::new(|| {
    let gauge = Gauge::new(
        "pgroute_dynamic_routes",
        "Number of routes currently materialised on demand under a default_route policy.",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});
