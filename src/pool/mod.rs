//! The route-pool core: route identity, per-route server/client pools, and
//! the collection of routes the Router serves.
//!
//! The data model here follows the shape described directly in spec.md's
//! own ServerPool/ClientPool/RoutePool sections; see the individual module
//! doc comments for which parts additionally draw on a retrieved source
//! file under `examples/original_source`. It owns no I/O loops itself —
//! those are [`crate::router`], [`crate::periodic`] and [`crate::pooler`].

mod client;
mod route;
mod route_pool;
mod server;

pub use client::{ClientPool, PendingClient};
pub use route::{Route, RouteKind, RoutePolicy};
pub use route_pool::RoutePool;
pub use server::{AttachedServer, Server, ServerId, ServerPool, ServerState};

use std::fmt;

/// Maximum byte length of a database or user name, matching PostgreSQL's
/// `NAMEDATALEN - 1` convention (see `original_source/src/od_pooler.c`'s
/// reliance on fixed-size `scheme` fields).
pub const MAX_IDENTITY_LEN: usize = 63;

/// A (database, user) pair. Equality is byte-exact: no case folding or
/// trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteId {
    pub database: String,
    pub user: String,
}

impl RouteId {
    pub fn new(database: impl Into<String>, user: impl Into<String>) -> RouteId {
        RouteId {
            database: database.into(),
            user: user.into(),
        }
    }

    /// `true` if either field exceeds [`MAX_IDENTITY_LEN`]. Checked by
    /// [`crate::router::Router`] before materialising a new dynamic route
    /// for a previously-unseen identity; an identity that already names an
    /// existing route is resolved regardless of length.
    pub fn is_oversized(&self) -> bool {
        self.database.len() > MAX_IDENTITY_LEN || self.user.len() > MAX_IDENTITY_LEN
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.database, self.user)
    }
}
