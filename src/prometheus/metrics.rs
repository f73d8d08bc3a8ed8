//! Metrics update functions for the Prometheus exporter.

use crate::pool::RoutePool;

use super::{DYNAMIC_ROUTES, ROUTE_CLIENTS, ROUTE_SERVERS};

/// Refreshes every gauge from the current state of `route_pool`. Called
/// once per scrape request.
pub fn update_metrics(route_pool: &RoutePool) {
    ROUTE_CLIENTS.reset();
    ROUTE_SERVERS.reset();

    let mut dynamic_routes = 0;
    for route in route_pool.iter() {
        let database = route.id.database.as_str();
        let user = route.id.user.as_str();

        ROUTE_CLIENTS
            .with_label_values(&["active", database, user])
            .set(route.client_pool.count_active() as f64);
        ROUTE_CLIENTS
            .with_label_values(&["pending", database, user])
            .set(route.client_pool.count_pending() as f64);

        ROUTE_SERVERS
            .with_label_values(&["active", database, user])
            .set(route.server_pool.count_active() as f64);
        ROUTE_SERVERS
            .with_label_values(&["idle", database, user])
            .set(route.server_pool.count_idle() as f64);

        if route.policy.is_dynamic() {
            dynamic_routes += 1;
        }
    }
    DYNAMIC_ROUTES.set(dynamic_routes as f64);
}
