//! Client-side bookkeeping for a route.
//!
//! Symmetric to [`super::ServerPool`] but with two buckets only: clients
//! waiting for a server (`pending`) and clients currently holding one
//! (`active`). The core never owns client I/O directly — a pending client
//! is represented by its sequence number plus a one-shot channel the
//! Router wakes when a server frees up.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use super::AttachedServer;
use crate::errors::PoolError;

/// A client parked in the `pending` bucket, waiting for an idle or newly
/// connected server. `notify` is fired exactly once, by
/// [`super::Route`]'s detach-reuse path or by [`super::RoutePool::gc`]-adjacent
/// cleanup on shutdown.
pub struct PendingClient {
    pub client_id: u64,
    pub notify: oneshot::Sender<Result<AttachedServer, PoolError>>,
}

/// Tracks which clients are attached to a route, and which are still
/// waiting for a server.
#[derive(Default)]
pub struct ClientPool {
    pending: VecDeque<PendingClient>,
    active: VecDeque<u64>,
}

impl ClientPool {
    pub fn new() -> ClientPool {
        ClientPool::default()
    }

    pub fn count_pending(&self) -> usize {
        self.pending.len()
    }

    pub fn count_active(&self) -> usize {
        self.active.len()
    }

    /// Sum of both buckets.
    pub fn total(&self) -> usize {
        self.pending.len() + self.active.len()
    }

    pub fn push_active(&mut self, client_id: u64) {
        self.active.push_back(client_id);
    }

    /// Removes one occurrence of `client_id` from `active`, if present.
    pub fn remove_active(&mut self, client_id: u64) -> bool {
        if let Some(pos) = self.active.iter().position(|id| *id == client_id) {
            self.active.remove(pos);
            true
        } else {
            false
        }
    }

    /// Parks a client at the tail of the `pending` bucket. FIFO order is
    /// preserved by [`Self::pop_pending`] — pending clients on a route
    /// wake in the order they arrived.
    pub fn push_pending(&mut self, client: PendingClient) {
        self.pending.push_back(client);
    }

    /// Pops the longest-waiting pending client, if any.
    pub fn pop_pending(&mut self) -> Option<PendingClient> {
        self.pending.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_clients_wake_in_fifo_order() {
        let mut pool = ClientPool::new();
        let (tx1, _rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();
        pool.push_pending(PendingClient {
            client_id: 1,
            notify: tx1,
        });
        pool.push_pending(PendingClient {
            client_id: 2,
            notify: tx2,
        });

        assert_eq!(pool.pop_pending().unwrap().client_id, 1);
        assert_eq!(pool.pop_pending().unwrap().client_id, 2);
        assert!(pool.pop_pending().is_none());
    }

    #[test]
    fn total_is_sum_of_both_buckets() {
        let mut pool = ClientPool::new();
        pool.push_active(10);
        pool.push_active(11);
        let (tx, _rx) = oneshot::channel();
        pool.push_pending(PendingClient {
            client_id: 12,
            notify: tx,
        });
        assert_eq!(pool.total(), 3);
        assert!(pool.remove_active(10));
        assert_eq!(pool.total(), 2);
        assert!(!pool.is_empty());
    }
}
