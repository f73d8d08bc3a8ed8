//! The collection of routes a Router serves.
//!
//! Lookup is linear, per the spec's own description of RoutePool lookup
//! ("linear over identities") — route cardinality is expected to stay in
//! the dozens-to-low-thousands range, so a `Vec` scan beats the
//! complexity of a keyed map that would also need to preserve insertion
//! order for `foreach`/`next`.

use super::{Route, RouteId, Server, ServerState};

#[derive(Default)]
pub struct RoutePool {
    routes: Vec<Route>,
}

impl RoutePool {
    pub fn new() -> RoutePool {
        RoutePool::default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route whose identity equals `id`.
    pub fn find(&self, id: &RouteId) -> Option<&Route> {
        self.routes.iter().find(|r| &r.id == id)
    }

    pub fn find_mut(&mut self, id: &RouteId) -> Option<&mut Route> {
        self.routes.iter_mut().find(|r| &r.id == id)
    }

    /// Appends a new route at the tail. A `Vec` push cannot fail short of
    /// aborting the process on allocation exhaustion, so this is
    /// infallible here.
    pub fn insert(&mut self, route: Route) -> &mut Route {
        self.routes.push(route);
        self.routes.last_mut().unwrap()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Route> {
        self.routes.iter_mut()
    }

    /// Applies `f` to every server in `state`, across every route, in
    /// insertion order of the routes. `f` is given the owning route's
    /// identity and policy alongside the server — the Rust stand-in for
    /// the source's `server->route` back-pointer lookup, without needing
    /// to borrow the whole `Route` (and its own `ServerPool`) while
    /// already inside that pool's `foreach_mut`.
    pub fn foreach_mut<F>(&mut self, state: ServerState, mut f: F)
    where
        F: FnMut(&RouteId, &super::RoutePolicy, &mut super::Server) -> Option<ServerState>,
    {
        for route in self.routes.iter_mut() {
            let id = &route.id;
            let policy = &route.policy;
            route
                .server_pool
                .foreach_mut(state, |server| f(id, policy, server));
        }
    }

    /// Scans routes in order, returning the first server in `state` via
    /// [`super::ServerPool::next`].
    pub fn next(&mut self, state: ServerState) -> Option<Server> {
        for route in self.routes.iter_mut() {
            if let Some(server) = route.server_pool.next(state) {
                return Some(server);
            }
        }
        None
    }

    /// Removes every dynamic route whose pools are both empty. Must only
    /// be called outside of a live iterator over the RoutePool.
    pub fn gc(&mut self) -> usize {
        let before = self.routes.len();
        self.routes.retain(|r| !r.is_gc_eligible());
        before - self.routes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{RouteKind, RoutePolicy};
    use std::sync::Arc;

    fn static_policy() -> Arc<RoutePolicy> {
        Arc::new(RoutePolicy {
            ttl_secs: 0,
            pool_size: 4,
            kind: RouteKind::Static,
        })
    }

    fn dynamic_policy() -> Arc<RoutePolicy> {
        Arc::new(RoutePolicy {
            ttl_secs: 0,
            pool_size: 4,
            kind: RouteKind::Dynamic,
        })
    }

    #[test]
    fn find_matches_by_exact_identity() {
        let mut pool = RoutePool::new();
        pool.insert(Route::new(
            RouteId::new("app", "alice"),
            "127.0.0.1".into(),
            5432,
            static_policy(),
        ));
        assert!(pool.find(&RouteId::new("app", "alice")).is_some());
        assert!(pool.find(&RouteId::new("app", "bob")).is_none());
    }

    #[test]
    fn gc_removes_only_empty_dynamic_routes() {
        let mut pool = RoutePool::new();
        pool.insert(Route::new(
            RouteId::new("app", "alice"),
            "127.0.0.1".into(),
            5432,
            static_policy(),
        ));
        pool.insert(Route::new(
            RouteId::new("tmp", "bob"),
            "127.0.0.1".into(),
            5432,
            dynamic_policy(),
        ));
        assert_eq!(pool.len(), 2);
        let removed = pool.gc();
        assert_eq!(removed, 1);
        assert_eq!(pool.len(), 1);
        assert!(pool.find(&RouteId::new("app", "alice")).is_some());
    }

    #[test]
    fn next_scans_routes_in_insertion_order() {
        use crate::pool::Server;

        let mut pool = RoutePool::new();
        pool.insert(Route::new(
            RouteId::new("db1", "u"),
            "127.0.0.1".into(),
            5432,
            static_policy(),
        ));
        pool.insert(Route::new(
            RouteId::new("db2", "u"),
            "127.0.0.1".into(),
            5432,
            static_policy(),
        ));
        pool.find_mut(&RouteId::new("db2", "u"))
            .unwrap()
            .server_pool
            .insert(Server::connecting(1, RouteId::new("db2", "u")));

        let server = pool.next(ServerState::Connect).unwrap();
        assert_eq!(server.id, 1);
        assert!(pool.next(ServerState::Connect).is_none());
    }
}
