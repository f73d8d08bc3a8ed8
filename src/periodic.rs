//! The Periodic maintenance task: one-second ticks that age idle servers,
//! reap expired ones, and emit statistics.
//!
//! Grounded in `examples/original_source/sources/periodic.c`'s
//! `od_periodic` loop. Shares the same `Arc<Mutex<RoutePool>>` as
//! [`crate::router::Router`] — the lock plays the role of the source's
//! single-executor affinity, letting step 1 run as a non-suspending
//! traversal the way `od_expire_mark` does.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::pool::{RoutePool, ServerState};

/// A PostgreSQL v3 `Terminate` message: tag `X` followed by a length-of-4
/// (self-inclusive, no payload) big-endian `int32`. Sent to an upstream
/// server before closing it so the backend sees a clean shutdown rather
/// than an abrupt socket close.
const TERMINATE_MESSAGE: [u8; 5] = [b'X', 0, 0, 0, 4];

pub struct Periodic {
    route_pool: Arc<Mutex<RoutePool>>,
    log_statistics: u64,
    shutdown: watch::Receiver<bool>,
}

impl Periodic {
    pub fn new(
        route_pool: Arc<Mutex<RoutePool>>,
        log_statistics: u64,
        shutdown: watch::Receiver<bool>,
    ) -> Periodic {
        Periodic {
            route_pool,
            log_statistics,
            shutdown,
        }
    }

    /// Runs the tick loop until told to stop. Cancellation is checked once
    /// per tick, between steps, never mid-traversal.
    pub async fn run(mut self) {
        info!("periodic: started");
        let mut tick: u64 = 0;
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.age_idle_servers();

            if *self.shutdown.borrow() {
                break;
            }
            self.reap_expired().await;

            if *self.shutdown.borrow() {
                break;
            }
            self.reap_closed();

            if self.log_statistics > 0 {
                tick += 1;
                if tick >= self.log_statistics {
                    self.emit_statistics();
                    tick = 0;
                }
            }

            tokio::select! {
                _ = sleep(StdDuration::from_millis(1000)) => {}
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("periodic: stopped");
    }

    /// Step 1: increments `idle_time` for every server in `IDLE`, or moves
    /// it to `EXPIRE` once it has reached the route's TTL. No `.await`
    /// anywhere in this call.
    fn age_idle_servers(&self) {
        let mut guard = self.route_pool.lock();
        guard.foreach_mut(ServerState::Idle, |_id, policy, server| {
            if policy.ttl_secs == 0 {
                return None;
            }
            if server.idle_time < policy.ttl_secs {
                server.idle_time += 1;
                None
            } else {
                Some(ServerState::Expire)
            }
        });
    }

    /// Step 2: drains the `EXPIRE` bucket across all routes, sending each
    /// server a `Terminate` message and closing its connection, then
    /// sweeping any dynamic route left empty. Each iteration may suspend on
    /// I/O, so it runs outside any held lock except for the brief pop/gc
    /// calls. A failed terminate is logged and does not stop the rest of
    /// the reap pass.
    async fn reap_expired(&self) {
        loop {
            let server = {
                let mut guard = self.route_pool.lock();
                guard.next(ServerState::Expire)
            };
            let Some(mut server) = server else { break };

            if let Some(mut io) = server.io.take() {
                debug!(
                    "periodic: closing idle server {} (idle {}s)",
                    server.id, server.idle_time
                );
                if let Err(err) = io.write_all(&TERMINATE_MESSAGE).await {
                    warn!("periodic: failed to terminate server {}: {err}", server.id);
                }
                drop(io);
            }
            server.idle_time = 0;
            server.route = None;

            let mut guard = self.route_pool.lock();
            let removed = guard.gc();
            if removed > 0 {
                debug!("periodic: garbage-collected {removed} empty dynamic route(s)");
            }
        }
    }

    /// Step 3: drains the `CLOSE` bucket across all routes — servers the
    /// Router has already explicitly closed (a failed connect, or a client
    /// detaching with [`crate::router::Disposition::Close`]) — freeing each
    /// one and sweeping any dynamic route left empty. Unlike `reap_expired`,
    /// a closed server's `io` is already gone by the time it reaches this
    /// bucket (dropped by the Router before the state change), so this step
    /// never suspends and the lock is held for the whole pass.
    fn reap_closed(&self) {
        let mut guard = self.route_pool.lock();
        loop {
            let Some(mut server) = guard.next(ServerState::Close) else {
                break;
            };
            if server.io.take().is_some() {
                warn!(
                    "periodic: closed server {} still held an io handle",
                    server.id
                );
            }
            server.idle_time = 0;
            server.route = None;

            let removed = guard.gc();
            if removed > 0 {
                debug!("periodic: garbage-collected {removed} empty dynamic route(s)");
            }
        }
    }

    /// Step 4: one log line per non-empty route (spec format:
    /// `[<database>, <user>] clients <N>, pool_active <N>, pool_idle <N>`).
    fn emit_statistics(&self) {
        let guard = self.route_pool.lock();
        if guard.is_empty() {
            return;
        }
        info!("statistics");
        for route in guard.iter() {
            let clients = route.client_pool.total();
            if clients == 0
                && route.server_pool.count_active() == 0
                && route.server_pool.count_idle() == 0
            {
                continue;
            }
            info!(
                "  {} clients {}, pool_active {}, pool_idle {}",
                route.id,
                clients,
                route.server_pool.count_active(),
                route.server_pool.count_idle()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Route, RouteId, RouteKind, RoutePolicy, Server, ServerState};
    use std::sync::Arc as StdArc;

    fn route_pool_with_idle_server(ttl_secs: u64, idle_time: u64) -> Arc<Mutex<RoutePool>> {
        let mut pool = RoutePool::new();
        let policy = StdArc::new(RoutePolicy {
            ttl_secs,
            pool_size: 4,
            kind: RouteKind::Dynamic,
        });
        let route = pool.insert(Route::new(
            RouteId::new("db", "user"),
            "127.0.0.1".into(),
            5432,
            policy,
        ));
        route.server_pool.insert(Server {
            id: 1,
            route: Some(route.id.clone()),
            io: None,
            idle_time,
            state: ServerState::Idle,
        });
        Arc::new(Mutex::new(pool))
    }

    #[test]
    fn aging_increments_idle_time_below_ttl() {
        let pool = route_pool_with_idle_server(3, 0);
        let (_tx, rx) = watch::channel(false);
        let periodic = Periodic::new(pool.clone(), 0, rx);
        periodic.age_idle_servers();
        let guard = pool.lock();
        let route = guard.find(&RouteId::new("db", "user")).unwrap();
        assert_eq!(route.server_pool.count_idle(), 1);
    }

    #[test]
    fn aging_expires_server_at_ttl() {
        let pool = route_pool_with_idle_server(3, 3);
        let (_tx, rx) = watch::channel(false);
        let periodic = Periodic::new(pool.clone(), 0, rx);
        periodic.age_idle_servers();
        let guard = pool.lock();
        let route = guard.find(&RouteId::new("db", "user")).unwrap();
        assert_eq!(route.server_pool.count_idle(), 0);
        assert_eq!(route.server_pool.count(ServerState::Expire), 1);
    }

    #[test]
    fn aging_is_noop_when_ttl_disabled() {
        let pool = route_pool_with_idle_server(0, 0);
        let (_tx, rx) = watch::channel(false);
        let periodic = Periodic::new(pool.clone(), 0, rx);
        for _ in 0..100 {
            periodic.age_idle_servers();
        }
        let guard = pool.lock();
        let route = guard.find(&RouteId::new("db", "user")).unwrap();
        assert_eq!(route.server_pool.count_idle(), 1);
        let server = &route.server_pool;
        assert_eq!(server.count(ServerState::Idle), 1);
    }

    #[tokio::test]
    async fn reap_drops_io_and_gcs_empty_dynamic_route() {
        let pool = route_pool_with_idle_server(3, 3);
        let (_tx, rx) = watch::channel(false);
        let periodic = Periodic::new(pool.clone(), 0, rx);
        periodic.age_idle_servers();
        periodic.reap_expired().await;
        let guard = pool.lock();
        assert!(guard.find(&RouteId::new("db", "user")).is_none());
    }

    #[tokio::test]
    async fn reap_sends_terminate_message_before_closing() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            sock.read_exact(&mut buf).await.unwrap();
            buf
        });
        let io = tokio::net::TcpStream::connect(addr).await.unwrap();

        let mut pool = RoutePool::new();
        let policy = StdArc::new(RoutePolicy {
            ttl_secs: 1,
            pool_size: 4,
            kind: RouteKind::Dynamic,
        });
        let route = pool.insert(Route::new(
            RouteId::new("db", "user"),
            "127.0.0.1".into(),
            5432,
            policy,
        ));
        route.server_pool.insert(Server {
            id: 1,
            route: Some(route.id.clone()),
            io: Some(io),
            idle_time: 0,
            state: ServerState::Expire,
        });
        let pool = Arc::new(Mutex::new(pool));

        let (_tx, rx) = watch::channel(false);
        let periodic = Periodic::new(pool, 0, rx);
        periodic.reap_expired().await;

        let received = accept.await.unwrap();
        assert_eq!(received, TERMINATE_MESSAGE);
    }

    #[tokio::test]
    async fn reap_closed_frees_a_detached_close_server_and_gcs_its_dynamic_route() {
        use crate::router::{DefaultRouteConfig, Disposition, Router, RouterConfig};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let route_pool = Arc::new(Mutex::new(RoutePool::new()));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (router, handle) = Router::new(
            RouterConfig {
                static_routes: vec![],
                default_route: Some(DefaultRouteConfig {
                    upstream_host: addr.ip().to_string(),
                    upstream_port: addr.port(),
                    policy: RoutePolicy {
                        ttl_secs: 60,
                        pool_size: 4,
                        kind: RouteKind::Dynamic,
                    },
                }),
            },
            route_pool.clone(),
            shutdown_rx.clone(),
        );
        tokio::spawn(router.run());

        let route_id = RouteId::new("tmp", "scratch");
        let attached = handle.attach(1, route_id.clone()).await.unwrap();
        let first_server_id = attached.server_id;
        handle.detach(1, attached, Disposition::Close).await;

        // Give the Router's message loop a turn to process the detach
        // before the periodic tick runs against the same RoutePool.
        tokio::task::yield_now().await;

        let periodic = Periodic::new(route_pool.clone(), 0, shutdown_rx);
        periodic.reap_closed();

        assert!(route_pool.lock().find(&route_id).is_none());

        let reattached = handle.attach(2, route_id.clone()).await.unwrap();
        assert_ne!(reattached.server_id, first_server_id);
        assert!(route_pool.lock().find(&route_id).is_some());
    }
}
