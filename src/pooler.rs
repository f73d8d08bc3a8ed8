//! The Pooler: owns the listening endpoint, accepts clients, configures
//! their sockets, and hands each one to workers via a queue.
//!
//! Grounded in `examples/original_source/src/od_pooler.c`'s
//! `od_pooler_main` accept loop. `machine_io_detach`/`attach` becomes
//! ordinary `TcpStream` ownership transfer through the `mpsc` channel —
//! Rust's single-owner semantics give the same "exactly one executor owns
//! the handle at any instant" guarantee for free.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{error, info, warn};
use socket2::SockRef;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{mpsc, watch};

use crate::errors::PoolerError;

/// A freshly accepted, configured, and detached client connection.
pub struct NewClient {
    pub id: u64,
    pub io: TcpStream,
    pub peer_addr: SocketAddr,
}

pub struct PoolerConfig {
    pub host: String,
    pub port: u16,
    pub backlog: u32,
    pub nodelay: bool,
    pub keepalive_secs: u64,
    pub readahead: usize,
}

pub struct Pooler {
    config: PoolerConfig,
    task_queue: mpsc::Sender<NewClient>,
    shutdown: watch::Receiver<bool>,
    client_seq: AtomicU64,
}

impl Pooler {
    pub fn new(
        config: PoolerConfig,
        task_queue: mpsc::Sender<NewClient>,
        shutdown: watch::Receiver<bool>,
    ) -> Pooler {
        Pooler {
            config,
            task_queue,
            shutdown,
            client_seq: AtomicU64::new(0),
        }
    }

    /// Resolves the listen address, creates the socket, binds, and begins
    /// listening with the configured backlog. Any failure here is fatal —
    /// the caller is expected to exit the process on `Err`.
    pub async fn bind(&self) -> Result<TcpListener, PoolerError> {
        // "*" means wildcard: omit the host from resolution entirely and
        // let the resolver hand back a passive-open address.
        let resolve_host = if self.config.host == "*" {
            "0.0.0.0"
        } else {
            self.config.host.as_str()
        };
        let addr = format!("{resolve_host}:{}", self.config.port)
            .to_socket_addrs()
            .map_err(|source| PoolerError::Resolve {
                host: self.config.host.clone(),
                port: self.config.port,
                source,
            })?
            .next()
            .ok_or_else(|| PoolerError::Resolve {
                host: self.config.host.clone(),
                port: self.config.port,
                source: std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "no addresses returned",
                ),
            })?;

        let bind_err = |source| PoolerError::Bind(addr.to_string(), source);

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;

        let backlog = if self.config.backlog > 0 {
            self.config.backlog
        } else {
            1024
        };
        let listener = socket.listen(backlog).map_err(bind_err)?;

        info!("");
        info!("listening on {}:{}", self.config.host, self.config.port);
        info!("");
        Ok(listener)
    }

    /// The accept loop. Runs until told to stop; never exits early on a
    /// single client's misbehaviour.
    pub async fn run(mut self, listener: TcpListener) {
        info!("pooler: started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            let (io, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(source) => {
                    error!("pooler: {}", PoolerError::Accept(source));
                    continue;
                }
            };

            if let Err(err) = self.configure_and_dispatch(io, peer_addr).await {
                warn!("pooler: dropping client {peer_addr}: {err}");
            }
        }
        info!("pooler: stopped");
    }

    async fn configure_and_dispatch(
        &mut self,
        io: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), PoolerError> {
        let sock_ref = SockRef::from(&io);
        sock_ref
            .set_nodelay(self.config.nodelay)
            .map_err(PoolerError::SocketConfig)?;
        if self.config.keepalive_secs > 0 {
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(self.config.keepalive_secs));
            sock_ref
                .set_tcp_keepalive(&keepalive)
                .map_err(PoolerError::SocketConfig)?;
        }
        if self.config.readahead > 0 {
            sock_ref
                .set_recv_buffer_size(self.config.readahead)
                .map_err(PoolerError::SocketConfig)?;
        }

        let id = self.client_seq.fetch_add(1, Ordering::Relaxed);
        let client = NewClient {
            id,
            io,
            peer_addr,
        };
        self.task_queue
            .send(client)
            .await
            .map_err(|_| PoolerError::ClientAllocation)
    }
}
