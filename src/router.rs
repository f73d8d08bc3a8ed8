//! The Router: serialises route lookup/creation and client-to-server
//! assignment.
//!
//! A single long-lived task owns the only writable handle to the
//! [`RoutePool`]; [`crate::periodic::Periodic`] is handed a clone of the
//! same `Arc<Mutex<RoutePool>>`. Everything else — workers, the Pooler —
//! talks to the Router only through [`RouterHandle`] and the message-based
//! attach/detach requests below.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};

use crate::errors::PoolError;
use crate::pool::{
    AttachedServer, Route, RouteId, RouteKind, RoutePolicy, RoutePool, Server, ServerId,
    ServerState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Reuse,
    Close,
}

pub enum RouterMessage {
    Attach {
        client_id: u64,
        route: RouteId,
        respond: oneshot::Sender<Result<AttachedServer, PoolError>>,
    },
    Detach {
        client_id: u64,
        server: AttachedServer,
        disposition: Disposition,
    },
}

/// Static route declarations known at startup, plus an optional policy for
/// routes materialised on demand.
pub struct RouterConfig {
    pub static_routes: Vec<StaticRouteConfig>,
    pub default_route: Option<DefaultRouteConfig>,
}

pub struct StaticRouteConfig {
    pub id: RouteId,
    pub upstream_host: String,
    pub upstream_port: u16,
    pub policy: RoutePolicy,
}

pub struct DefaultRouteConfig {
    pub upstream_host: String,
    pub upstream_port: u16,
    pub policy: RoutePolicy,
}

/// Cloneable handle used by workers to send `attach`/`detach` requests.
#[derive(Clone)]
pub struct RouterHandle {
    sender: mpsc::Sender<RouterMessage>,
}

impl RouterHandle {
    pub async fn attach(&self, client_id: u64, route: RouteId) -> Result<AttachedServer, PoolError> {
        let (respond, recv) = oneshot::channel();
        self.sender
            .send(RouterMessage::Attach {
                client_id,
                route,
                respond,
            })
            .await
            .map_err(|_| PoolError::ShuttingDown)?;
        recv.await.map_err(|_| PoolError::ShuttingDown)?
    }

    pub async fn detach(&self, client_id: u64, server: AttachedServer, disposition: Disposition) {
        let _ = self
            .sender
            .send(RouterMessage::Detach {
                client_id,
                server,
                disposition,
            })
            .await;
    }
}

pub struct Router {
    receiver: mpsc::Receiver<RouterMessage>,
    route_pool: Arc<Mutex<RoutePool>>,
    default_route: Option<DefaultRouteConfig>,
    next_server_id: AtomicU64,
    shutdown: watch::Receiver<bool>,
}

impl Router {
    /// Builds the Router, pre-populating the RoutePool with every static
    /// route from `config` so they exist before the first client arrives.
    pub fn new(
        config: RouterConfig,
        route_pool: Arc<Mutex<RoutePool>>,
        shutdown: watch::Receiver<bool>,
    ) -> (Router, RouterHandle) {
        {
            let mut guard = route_pool.lock();
            for route in config.static_routes {
                guard.insert(Route::new(
                    route.id,
                    route.upstream_host,
                    route.upstream_port,
                    Arc::new(route.policy),
                ));
            }
        }

        let (sender, receiver) = mpsc::channel(1024);
        let router = Router {
            receiver,
            route_pool,
            default_route: config.default_route,
            next_server_id: AtomicU64::new(1),
            shutdown,
        };
        (router, RouterHandle { sender })
    }

    /// Exposes the shared RoutePool handle so [`crate::periodic::Periodic`]
    /// can be constructed with the same lock.
    pub fn route_pool_handle(&self) -> Arc<Mutex<RoutePool>> {
        self.route_pool.clone()
    }

    /// The Router's message loop. Runs until the channel closes (every
    /// `RouterHandle` dropped).
    pub async fn run(mut self) {
        info!("router: started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            let message = tokio::select! {
                message = self.receiver.recv() => message,
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };
            let Some(message) = message else { break };
            match message {
                RouterMessage::Attach {
                    client_id,
                    route,
                    respond,
                } => self.handle_attach(client_id, route, respond).await,
                RouterMessage::Detach {
                    client_id,
                    server,
                    disposition,
                } => self.handle_detach(client_id, server, disposition),
            }
        }
        info!("router: stopped");
    }

    async fn handle_attach(
        &self,
        client_id: u64,
        route_id: RouteId,
        respond: oneshot::Sender<Result<AttachedServer, PoolError>>,
    ) {
        enum Plan {
            Immediate(AttachedServer),
            Connect { host: String, port: u16, server_id: ServerId },
            Pending,
            Reject(PoolError),
        }

        let plan = {
            let mut guard = self.route_pool.lock();
            let route = match self.resolve_route(&mut guard, &route_id) {
                Ok(route) => route,
                Err(err) => {
                    respond.send(Err(err)).ok();
                    return;
                }
            };

            if let Some(server) = route.server_pool.next(ServerState::Idle) {
                let id = server.id;
                let io = server.io.expect("idle server always owns its io");
                route.server_pool.insert(Server {
                    id,
                    route: Some(route_id.clone()),
                    io: None,
                    idle_time: 0,
                    state: ServerState::Active,
                });
                route.client_pool.push_active(client_id);
                Plan::Immediate(AttachedServer {
                    server_id: id,
                    route: route_id.clone(),
                    io,
                })
            } else if route.has_capacity() {
                let server_id = self.next_server_id.fetch_add(1, Ordering::Relaxed);
                route
                    .server_pool
                    .insert(Server::connecting(server_id, route_id.clone()));
                Plan::Connect {
                    host: route.upstream_host.clone(),
                    port: route.upstream_port,
                    server_id,
                }
            } else if route.policy.pool_size == 0 {
                // A zero-capacity route can never service a pending client;
                // queuing would wait forever, so fail fast instead.
                Plan::Reject(PoolError::PoolFull(route_id.clone()))
            } else {
                Plan::Pending
            }
        };

        match plan {
            Plan::Immediate(server) => {
                respond.send(Ok(server)).ok();
            }
            Plan::Reject(err) => {
                respond.send(Err(err)).ok();
            }
            Plan::Pending => {
                let mut guard = self.route_pool.lock();
                if let Some(route) = guard.find_mut(&route_id) {
                    route.client_pool.push_pending(crate::pool::PendingClient {
                        client_id,
                        notify: respond,
                    });
                }
            }
            Plan::Connect {
                host,
                port,
                server_id,
            } => {
                // Suspension point: no lock held across this await.
                match TcpStream::connect((host.as_str(), port)).await {
                    Ok(io) => {
                        let mut guard = self.route_pool.lock();
                        if let Some(route) = guard.find_mut(&route_id) {
                            route.server_pool.take(server_id);
                            route.server_pool.insert(Server {
                                id: server_id,
                                route: Some(route_id.clone()),
                                io: None,
                                idle_time: 0,
                                state: ServerState::Active,
                            });
                            route.client_pool.push_active(client_id);
                        }
                        respond
                            .send(Ok(AttachedServer {
                                server_id,
                                route: route_id,
                                io,
                            }))
                            .ok();
                    }
                    Err(err) => {
                        warn!("router: connect to {host}:{port} failed: {err}");
                        let mut guard = self.route_pool.lock();
                        if let Some(route) = guard.find_mut(&route_id) {
                            if let Some(placeholder) = route.server_pool.take(server_id) {
                                route.server_pool.set_owned(placeholder, ServerState::Close);
                            }
                        }
                        respond
                            .send(Err(PoolError::ConnectFailed {
                                route: route_id,
                                reason: err.to_string(),
                            }))
                            .ok();
                    }
                }
            }
        }
    }

    fn handle_detach(&self, client_id: u64, server: AttachedServer, disposition: Disposition) {
        let mut guard = self.route_pool.lock();
        let route = match guard.find_mut(&server.route) {
            Some(route) => route,
            None => return,
        };
        route.client_pool.remove_active(client_id);

        let Some(mut placeholder) = route.server_pool.take(server.server_id) else {
            return;
        };

        match disposition {
            Disposition::Reuse => {
                placeholder.io = Some(server.io);
                placeholder.idle_time = 0;
                route.server_pool.set_owned(placeholder, ServerState::Idle);

                if let Some(pending) = route.client_pool.pop_pending() {
                    let Some(mut server) = route.server_pool.next(ServerState::Idle) else {
                        route.client_pool.push_pending(pending);
                        return;
                    };
                    let io = server.io.take().expect("idle server always owns its io");
                    let id = server.id;
                    route.server_pool.insert(Server {
                        id,
                        route: Some(server.route.clone().unwrap_or_else(|| route.id.clone())),
                        io: None,
                        idle_time: 0,
                        state: ServerState::Active,
                    });
                    route.client_pool.push_active(pending.client_id);
                    pending
                        .notify
                        .send(Ok(AttachedServer {
                            server_id: id,
                            route: route.id.clone(),
                            io,
                        }))
                        .ok();
                }
            }
            Disposition::Close => {
                drop(server.io);
                route.server_pool.set_owned(placeholder, ServerState::Close);
            }
        }
    }

    /// Resolves `route_id` to an existing (possibly freshly-materialised
    /// dynamic) Route, or rejects with [`PoolError::NoRoute`] if it is
    /// unknown and no default policy permits creating it on demand, or with
    /// [`PoolError::IdentityTooLong`] if creating it would require a
    /// database/user identity longer than [`crate::pool::MAX_IDENTITY_LEN`].
    /// An identity that is already a known route is always resolved
    /// regardless of length — the bound only gates creating new routes.
    fn resolve_route<'a>(
        &self,
        route_pool: &'a mut RoutePool,
        route_id: &RouteId,
    ) -> Result<&'a mut Route, PoolError> {
        if route_pool.find(route_id).is_some() {
            return Ok(route_pool.find_mut(route_id).unwrap());
        }
        if route_id.is_oversized() {
            return Err(PoolError::IdentityTooLong(route_id.clone()));
        }
        let default = self
            .default_route
            .as_ref()
            .ok_or_else(|| PoolError::NoRoute(route_id.clone()))?;
        let route = Route::new(
            route_id.clone(),
            default.upstream_host.clone(),
            default.upstream_port,
            Arc::new(RoutePolicy {
                kind: RouteKind::Dynamic,
                ..default.policy
            }),
        );
        Ok(route_pool.insert(route))
    }
}

/// Convenience constructor for a `default_route`-less Router used in tests
/// that only exercise static routes.
pub fn static_only_config(routes: Vec<StaticRouteConfig>) -> RouterConfig {
    RouterConfig {
        static_routes: routes,
        default_route: None,
    }
}
