//! Live registry of validated endpoints.

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::error::PoolExhausted;
use crate::proxy::ValidatedEndpoint;

/// Rotating pool of validated endpoints.
///
/// Selection is round-robin over the members in insertion order: the cursor
/// advances modulo the live length on every call, so given the pool order
/// the selection sequence is deterministic and load spreads evenly across
/// relays instead of hammering one.
pub struct ProxyPool {
    /// All members of the pool.
    members: RwLock<Vec<ValidatedEndpoint>>,
    /// Used for round-robin selection.
    cursor: Mutex<usize>,
    /// Size ceiling enforced by every merge.
    max_size: usize,
    /// Consecutive failures before a member is evicted.
    max_penalties: u32,
}

impl ProxyPool {
    /// Create an empty pool.
    pub fn new(max_size: usize, max_penalties: u32) -> Self {
        Self {
            members: RwLock::new(Vec::new()),
            cursor: Mutex::new(0),
            max_size,
            max_penalties,
        }
    }

    /// Create a pool seeded with freshly validated endpoints.
    pub fn with_endpoints(
        endpoints: Vec<ValidatedEndpoint>,
        max_size: usize,
        max_penalties: u32,
    ) -> Self {
        let pool = Self::new(max_size, max_penalties);
        pool.replenish(endpoints);
        pool
    }

    /// Current member count.
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Next endpoint in rotation.
    pub fn select(&self) -> Result<ValidatedEndpoint, PoolExhausted> {
        let members = self.members.read();
        if members.is_empty() {
            return Err(PoolExhausted);
        }
        let mut cursor = self.cursor.lock();
        *cursor = (*cursor + 1) % members.len();
        Ok(members[*cursor].clone())
    }

    /// Record a failed attempt against `key`. After `max_penalties`
    /// consecutive strikes the endpoint is evicted. Returns true when this
    /// call evicted it.
    pub fn penalize(&self, key: &str) -> bool {
        let mut members = self.members.write();
        let Some(pos) = members.iter().position(|e| e.key() == key) else {
            return false;
        };

        let endpoint = &mut members[pos];
        endpoint.failure_count += 1;
        endpoint.strikes += 1;
        if endpoint.strikes < self.max_penalties {
            return false;
        }

        warn!(
            "endpoint {} evicted after {} consecutive failures",
            key, endpoint.strikes
        );
        members.remove(pos);
        let mut cursor = self.cursor.lock();
        if members.is_empty() {
            *cursor = 0;
        } else {
            *cursor %= members.len();
        }
        true
    }

    /// Record a successful attempt against `key`; a success breaks a strike
    /// streak.
    pub fn reward(&self, key: &str) {
        let mut members = self.members.write();
        if let Some(endpoint) = members.iter_mut().find(|e| e.key() == key) {
            endpoint.success_count += 1;
            endpoint.strikes = 0;
        }
    }

    /// Merge newly validated endpoints, skipping `(host, port)` keys already
    /// present. When the merge would exceed the ceiling, members are ranked
    /// by probe latency and the slowest excess is dropped. Returns how many
    /// endpoints were actually added.
    pub fn replenish(&self, fresh: Vec<ValidatedEndpoint>) -> usize {
        let mut members = self.members.write();

        let mut added = 0;
        for endpoint in fresh {
            if members.iter().any(|e| e.key() == endpoint.key()) {
                debug!("endpoint {} already pooled, skipping", endpoint);
                continue;
            }
            members.push(endpoint);
            added += 1;
        }

        if members.len() > self.max_size {
            members.sort_by_key(|e| e.latency);
            members.truncate(self.max_size);
            let mut cursor = self.cursor.lock();
            *cursor = 0;
        }

        info!("pool replenished: {} added, {} total", added, members.len());
        added
    }
}
