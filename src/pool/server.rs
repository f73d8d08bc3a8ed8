//! Server lifecycle state machine.
//!
//! The bucketed-by-state shape (one ordered sequence per lifecycle state,
//! with counters kept consistent with bucket lengths) follows the data
//! model described in the spec's ServerPool section directly — no
//! retrieved Odyssey source file covers this bucket layout itself, only
//! the aging/reaping traversal in `examples/original_source/sources/periodic.c`.
//! Here it is expressed as one `VecDeque` per [`ServerState`], where a
//! server is a plain value that moves between them: there is no
//! `Arc<Mutex<Server>>` per connection — ownership of a `Server` *is*
//! membership in exactly one bucket, so "no server is in more than one
//! bucket at once" holds by construction rather than by convention.

use std::collections::VecDeque;

use tokio::net::TcpStream;

use super::RouteId;

pub type ServerId = u64;

/// Permitted transitions: `Connect -> Active -> Idle <-> Active`;
/// `Idle -> Expire -> Undef`; any state `-> Close -> Undef`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerState {
    Connect,
    Active,
    Idle,
    Expire,
    Close,
    Undef,
}

impl ServerState {
    const ALL: [ServerState; 6] = [
        ServerState::Connect,
        ServerState::Active,
        ServerState::Idle,
        ServerState::Expire,
        ServerState::Close,
        ServerState::Undef,
    ];

    fn index(self) -> usize {
        match self {
            ServerState::Connect => 0,
            ServerState::Active => 1,
            ServerState::Idle => 2,
            ServerState::Expire => 3,
            ServerState::Close => 4,
            ServerState::Undef => 5,
        }
    }
}

/// A server checked out to whoever called `attach`. Carries the live I/O
/// handle; the pool itself keeps only a state-tracking placeholder (`io:
/// None`) while the server is checked out — see DESIGN.md, "ACTIVE
/// checkout".
pub struct AttachedServer {
    pub server_id: ServerId,
    pub route: RouteId,
    pub io: TcpStream,
}

/// An upstream connection.
///
/// `route` is a weak back-reference: it identifies the owning route for
/// lookup but the route itself owns no handle back. It is `None` only
/// while the server sits in `Undef`, in transit between a bucket that has
/// released it and the one that will claim it.
pub struct Server {
    pub id: ServerId,
    pub route: Option<RouteId>,
    pub io: Option<TcpStream>,
    /// Seconds spent continuously in `Idle`. Monotonically non-decreasing
    /// while idle; reset to zero the instant the server leaves `Idle`.
    pub idle_time: u64,
    pub state: ServerState,
}

impl Server {
    /// A server under construction: no I/O yet, reserved in the `Connect`
    /// bucket so pool-size accounting sees it before the upstream connect
    /// resolves.
    pub fn connecting(id: ServerId, route: RouteId) -> Server {
        Server {
            id,
            route: Some(route),
            io: None,
            idle_time: 0,
            state: ServerState::Connect,
        }
    }
}

/// Per-route bucket of servers, keyed by lifecycle state.
///
/// Every non-suspending operation here is implemented with no `.await` in
/// its body; callers are expected to hold the surrounding
/// [`parking_lot::Mutex`] (see `crate::pool::route_pool`) for the whole
/// call, which the type system enforces transitively since the guard is
/// `!Send`.
pub struct ServerPool {
    buckets: [VecDeque<Server>; 6],
}

impl Default for ServerPool {
    fn default() -> Self {
        ServerPool {
            buckets: [
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
            ],
        }
    }
}

impl ServerPool {
    pub fn new() -> ServerPool {
        ServerPool::default()
    }

    fn bucket(&self, state: ServerState) -> &VecDeque<Server> {
        &self.buckets[state.index()]
    }

    fn bucket_mut(&mut self, state: ServerState) -> &mut VecDeque<Server> {
        &mut self.buckets[state.index()]
    }

    /// O(1) bucket length read.
    pub fn count(&self, state: ServerState) -> usize {
        self.bucket(state).len()
    }

    pub fn count_active(&self) -> usize {
        self.count(ServerState::Active)
    }

    pub fn count_idle(&self) -> usize {
        self.count(ServerState::Idle)
    }

    /// Total servers owned by this pool, across every bucket.
    pub fn total(&self) -> usize {
        ServerState::ALL.iter().map(|s| self.count(*s)).sum()
    }

    /// Inserts a freshly-constructed server (e.g. from [`Server::connecting`])
    /// at the tail of its own `state` bucket.
    pub fn insert(&mut self, server: Server) {
        let state = server.state;
        self.bucket_mut(state).push_back(server);
    }

    /// Moves `server` (already popped out of a bucket, e.g. via [`Self::next`])
    /// to the tail of `new_state`'s bucket, resetting `idle_time` if it is
    /// leaving `Idle`.
    pub fn set_owned(&mut self, mut server: Server, new_state: ServerState) {
        if server.state == ServerState::Idle && new_state != ServerState::Idle {
            server.idle_time = 0;
        }
        server.state = new_state;
        self.bucket_mut(new_state).push_back(server);
    }

    /// Finds `id` in its current bucket and moves it to `new_state`'s tail.
    /// Precondition: `id` currently belongs to this pool. Returns `false`
    /// if no server with `id` is found in any bucket.
    pub fn set(&mut self, id: ServerId, new_state: ServerState) -> bool {
        for state in ServerState::ALL {
            if let Some(pos) = self.bucket(state).iter().position(|s| s.id == id) {
                let server = self.bucket_mut(state).remove(pos).unwrap();
                self.set_owned(server, new_state);
                return true;
            }
        }
        false
    }

    /// Pops the head of `state`'s bucket, leaving it logically in `Undef`.
    /// Caller must re-home it via [`Self::insert`]/[`Self::set_owned`].
    pub fn next(&mut self, state: ServerState) -> Option<Server> {
        let mut server = self.bucket_mut(state).pop_front()?;
        server.state = ServerState::Undef;
        Some(server)
    }

    /// Removes `id` from whichever bucket currently holds it and returns
    /// it as an owned value, leaving it logically in `Undef`. Unlike
    /// [`Self::set`], the caller takes ownership instead of the pool
    /// re-homing it — used by the Router to check a server out to a
    /// client, since checkout tracks physical I/O custody separately from
    /// bucket membership (see DESIGN.md).
    pub fn take(&mut self, id: ServerId) -> Option<Server> {
        for state in ServerState::ALL {
            if let Some(pos) = self.bucket(state).iter().position(|s| s.id == id) {
                let mut server = self.bucket_mut(state).remove(pos).unwrap();
                server.state = ServerState::Undef;
                return Some(server);
            }
        }
        None
    }

    /// Applies `f` to every server currently in `state`, in order. `f`
    /// returns `Some(new_state)` to move the server, `None` to leave it
    /// where it is.
    ///
    /// The whole `state` bucket is detached up front — equivalent to
    /// capturing the successor pointer before each callback — so servers
    /// `f` itself reinserts into `state` (by returning `Some(state)`, a
    /// no-op move) are not revisited in this pass. No `.await` appears
    /// anywhere in this function; it must not suspend.
    pub fn foreach_mut<F>(&mut self, state: ServerState, mut f: F)
    where
        F: FnMut(&mut Server) -> Option<ServerState>,
    {
        let mut pending = std::mem::take(self.bucket_mut(state));
        while let Some(mut server) = pending.pop_front() {
            match f(&mut server) {
                Some(new_state) if new_state != state => self.set_owned(server, new_state),
                _ => {
                    server.state = state;
                    self.bucket_mut(state).push_back(server);
                }
            }
        }
    }
}
