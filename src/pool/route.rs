//! A single (database, user) route: its identity, its upstream address,
//! its shared policy, and the server/client pools it owns.

use std::sync::Arc;

use super::{ClientPool, RouteId, ServerPool};

/// Whether a route was declared by configuration or materialised on first
/// reference. Static routes are never garbage-collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Static,
    Dynamic,
}

/// Immutable policy shared by one or more routes. Dynamic routes created
/// under a `default_route` block all share one `Arc<RoutePolicy>`; static
/// routes typically get their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    /// Idle TTL in seconds. `0` disables aging.
    pub ttl_secs: u64,
    /// Maximum servers in this route's ServerPool (CONNECT + ACTIVE + IDLE).
    pub pool_size: usize,
    pub kind: RouteKind,
}

impl RoutePolicy {
    pub fn is_dynamic(&self) -> bool {
        self.kind == RouteKind::Dynamic
    }
}

pub struct Route {
    pub id: RouteId,
    pub upstream_host: String,
    pub upstream_port: u16,
    pub policy: Arc<RoutePolicy>,
    pub server_pool: ServerPool,
    pub client_pool: ClientPool,
}

impl Route {
    pub fn new(
        id: RouteId,
        upstream_host: String,
        upstream_port: u16,
        policy: Arc<RoutePolicy>,
    ) -> Route {
        Route {
            id,
            upstream_host,
            upstream_port,
            policy,
            server_pool: ServerPool::new(),
            client_pool: ClientPool::new(),
        }
    }

    /// GC-eligible iff dynamic and both pools are empty.
    pub fn is_gc_eligible(&self) -> bool {
        self.policy.is_dynamic() && self.server_pool.total() == 0 && self.client_pool.is_empty()
    }

    /// Servers reserved or live against this route's `pool_size` limit:
    /// CONNECT (in-flight) + ACTIVE + IDLE.
    pub fn reserved_servers(&self) -> usize {
        use super::ServerState::*;
        self.server_pool.count(Connect) + self.server_pool.count(Active) + self.server_pool.count(Idle)
    }

    pub fn has_capacity(&self) -> bool {
        self.reserved_servers() < self.policy.pool_size
    }
}
