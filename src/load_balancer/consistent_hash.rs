//! Consistent hashing over a fixed-size ring.
//!
//! # Responsibilities
//! - Place backends on a ring of `ring_size` slots, probing linearly on collision
//! - Map request keys to the first occupied slot at or after the key's slot
//! - Remove backends by their original hash slot
//!
//! # Design Decisions
//! - One node per backend, no virtual nodes
//! - Occupied slots kept in a sorted `Vec` for binary-search lookup
//! - The ring lives behind a single mutex in [`HashRingBalancer`]

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::BalancerError;
use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Map `key` onto a slot in `[0, ring_size)`.
///
/// Uses the first eight bytes of a SHA-256 digest. The digest only serves as a
/// stable, well-mixed hash; nothing here relies on its cryptographic
/// properties. Small rings collide often, so `ring_size` should be well above
/// the number of backends to keep probe chains short.
///
/// # Panics
/// If `ring_size` is zero. [`HashRing::new`] rejects that size.
pub fn hash_slot(key: &str, ring_size: usize) -> usize {
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % ring_size as u64) as usize
}

/// A hash ring mapping slots to backends.
#[derive(Debug)]
pub struct HashRing {
    ring_size: usize,
    nodes: HashMap<usize, Arc<Backend>>,
    /// Sorted keys of `nodes`.
    slots: Vec<usize>,
}

impl HashRing {
    /// Create an empty ring. Returns `None` for a zero-sized ring.
    pub fn new(ring_size: usize) -> Option<Self> {
        if ring_size == 0 {
            return None;
        }
        Some(Self {
            ring_size,
            nodes: HashMap::new(),
            slots: Vec::new(),
        })
    }

    pub fn ring_size(&self) -> usize {
        self.ring_size
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Occupied slots in ascending order.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Backend occupying `slot`, if any.
    pub fn node_at(&self, slot: usize) -> Option<&Arc<Backend>> {
        self.nodes.get(&slot)
    }

    /// Place `backend` on the ring and return its slot.
    ///
    /// Starts at the hash of the backend address and probes forward, wrapping,
    /// until a free slot is found.
    pub fn add_node(&mut self, backend: Arc<Backend>) -> Result<usize, BalancerError> {
        let mut slot = hash_slot(backend.address(), self.ring_size);
        let mut probes = 0;
        while self.nodes.contains_key(&slot) {
            probes += 1;
            if probes >= self.ring_size {
                return Err(BalancerError::RingFull {
                    ring_size: self.ring_size,
                });
            }
            slot = (slot + 1) % self.ring_size;
        }

        self.nodes.insert(slot, backend);
        let index = self.slots.partition_point(|&s| s < slot);
        self.slots.insert(index, slot);
        Ok(slot)
    }

    /// Remove `backend` from the slot its address hashes to.
    ///
    /// Only the original hash slot is checked. A backend that was displaced by
    /// probing when it was added is not found and stays on the ring; the call
    /// then returns `None`, as it does for a backend that was never added.
    pub fn remove_node(&mut self, backend: &Backend) -> Option<usize> {
        let slot = hash_slot(backend.address(), self.ring_size);
        match self.nodes.get(&slot) {
            Some(node) if node.address() == backend.address() => {}
            _ => return None,
        }

        self.nodes.remove(&slot);
        if let Ok(index) = self.slots.binary_search(&slot) {
            self.slots.remove(index);
        }
        Some(slot)
    }

    /// Backend owning `key`: the first occupied slot at or after the key's
    /// slot, wrapping to the lowest occupied slot.
    pub fn assign(&self, key: &str) -> Result<Arc<Backend>, BalancerError> {
        let start = self.start_index(key)?;
        self.backend_at_index(start)
    }

    /// Like [`assign`](Self::assign) but walks clockwise past dead backends.
    pub fn assign_alive(&self, key: &str) -> Result<Arc<Backend>, BalancerError> {
        let start = self.start_index(key)?;
        let len = self.slots.len();
        for offset in 0..len {
            let backend = self.backend_at_index((start + offset) % len)?;
            if backend.is_alive() {
                return Ok(backend);
            }
        }
        Err(BalancerError::NoLiveBackend)
    }

    fn start_index(&self, key: &str) -> Result<usize, BalancerError> {
        if self.slots.is_empty() {
            return Err(BalancerError::EmptyRing);
        }
        let slot = hash_slot(key, self.ring_size);
        let index = self.slots.partition_point(|&s| s < slot);
        Ok(if index == self.slots.len() { 0 } else { index })
    }

    fn backend_at_index(&self, index: usize) -> Result<Arc<Backend>, BalancerError> {
        self.slots
            .get(index)
            .and_then(|slot| self.nodes.get(slot))
            .cloned()
            .ok_or(BalancerError::EmptyRing)
    }
}

/// Consistent-hash selector: a [`HashRing`] behind a mutex.
#[derive(Debug)]
pub struct HashRingBalancer {
    ring: Mutex<HashRing>,
}

impl HashRingBalancer {
    pub fn new(ring: HashRing) -> Self {
        Self {
            ring: Mutex::new(ring),
        }
    }

    /// Add every backend to `ring`, in list order.
    pub fn with_backends(ring: HashRing, backends: &[Arc<Backend>]) -> Result<Self, BalancerError> {
        let balancer = Self::new(ring);
        for backend in backends {
            let slot = balancer.add_node(backend.clone())?;
            tracing::info!(address = %backend.address(), slot, "Added node");
        }
        Ok(balancer)
    }

    pub fn add_node(&self, backend: Arc<Backend>) -> Result<usize, BalancerError> {
        self.lock().add_node(backend)
    }

    pub fn remove_node(&self, backend: &Backend) -> Option<usize> {
        self.lock().remove_node(backend)
    }

    pub fn assign(&self, key: &str) -> Result<Arc<Backend>, BalancerError> {
        self.lock().assign(key)
    }

    /// Snapshot of the occupied slots.
    pub fn slots(&self) -> Vec<usize> {
        self.lock().slots().to_vec()
    }

    fn lock(&self) -> MutexGuard<'_, HashRing> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LoadBalancer for HashRingBalancer {
    /// The ring is authoritative; `backends` is not consulted.
    fn next_server(&self, _backends: &[Arc<Backend>], key: &str) -> Result<Arc<Backend>, BalancerError> {
        self.lock().assign_alive(key)
    }

    fn name(&self) -> &'static str {
        "consistent-hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// First generated address whose hash lands on `slot`.
    fn address_at(slot: usize, ring_size: usize) -> String {
        (0u32..)
            .map(|i| format!("http://10.{}.{}.1:80", i / 256, i % 256))
            .find(|a| hash_slot(a, ring_size) == slot)
            .unwrap()
    }

    fn key_at(slot: usize, ring_size: usize) -> String {
        (0u32..)
            .map(|i| format!("key-{}", i))
            .find(|k| hash_slot(k, ring_size) == slot)
            .unwrap()
    }

    fn backend(address: &str) -> Arc<Backend> {
        Arc::new(Backend::parse(address).unwrap())
    }

    fn ring_with_slots(ring_size: usize, slots: &[usize]) -> (HashRing, Vec<Arc<Backend>>) {
        let mut ring = HashRing::new(ring_size).unwrap();
        let mut placed = Vec::new();
        for &slot in slots {
            let b = backend(&address_at(slot, ring_size));
            assert_eq!(ring.add_node(b.clone()).unwrap(), slot);
            placed.push(b);
        }
        (ring, placed)
    }

    #[test]
    fn hash_is_stable_and_in_range() {
        for size in [1, 7, 50, 1024] {
            let a = hash_slot("http://127.0.0.1:3000", size);
            assert_eq!(a, hash_slot("http://127.0.0.1:3000", size));
            assert!(a < size);
        }
    }

    #[test]
    fn zero_sized_ring_is_rejected() {
        assert!(HashRing::new(0).is_none());
    }

    #[test]
    fn assign_picks_first_slot_at_or_after_key() {
        let (ring, placed) = ring_with_slots(50, &[10, 40]);
        let got = ring.assign(&key_at(25, 50)).unwrap();
        assert_eq!(got.address(), placed[1].address());
    }

    #[test]
    fn assign_wraps_to_lowest_slot() {
        let (ring, placed) = ring_with_slots(50, &[10, 40]);
        let got = ring.assign(&key_at(45, 50)).unwrap();
        assert_eq!(got.address(), placed[0].address());
    }

    #[test]
    fn assign_on_exact_slot_hits_that_node() {
        let (ring, placed) = ring_with_slots(50, &[10, 40]);
        let got = ring.assign(&key_at(40, 50)).unwrap();
        assert_eq!(got.address(), placed[1].address());
    }

    #[test]
    fn assign_is_deterministic() {
        let mut ring = HashRing::new(1024).unwrap();
        for port in 3000..3010 {
            ring.add_node(backend(&format!("http://127.0.0.1:{}", port))).unwrap();
        }
        for i in 0..100 {
            let key = format!("client-{}", i);
            let first = ring.assign(&key).unwrap();
            let second = ring.assign(&key).unwrap();
            assert_eq!(first.address(), second.address());
        }
    }

    #[test]
    fn empty_ring_fails() {
        let ring = HashRing::new(50).unwrap();
        assert_eq!(ring.assign("anything").unwrap_err(), BalancerError::EmptyRing);
        assert_eq!(ring.assign_alive("anything").unwrap_err(), BalancerError::EmptyRing);
    }

    #[test]
    fn collision_probes_to_next_slot_and_wraps() {
        let size = 50;
        let mut ring = HashRing::new(size).unwrap();
        let first = address_at(size - 1, size);
        let colliding = (0u32..)
            .map(|i| format!("http://192.168.{}.{}:80", i / 256, i % 256))
            .find(|a| hash_slot(a, size) == size - 1 && *a != first)
            .unwrap();

        assert_eq!(ring.add_node(backend(&first)).unwrap(), size - 1);
        assert_eq!(ring.add_node(backend(&colliding)).unwrap(), 0);
        assert_eq!(ring.slots(), &[0, size - 1]);
    }

    #[test]
    fn ring_full_after_ring_size_nodes() {
        let mut ring = HashRing::new(4).unwrap();
        for port in 0..4 {
            ring.add_node(backend(&format!("http://127.0.0.1:{}", 9000 + port))).unwrap();
        }
        let err = ring.add_node(backend("http://127.0.0.1:9100")).unwrap_err();
        assert_eq!(err, BalancerError::RingFull { ring_size: 4 });
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn remove_by_original_slot() {
        let (mut ring, placed) = ring_with_slots(50, &[10, 40]);
        assert_eq!(ring.remove_node(&placed[0]), Some(10));
        assert_eq!(ring.slots(), &[40]);
        assert!(ring.node_at(10).is_none());
        assert_eq!(ring.remove_node(&placed[0]), None);
    }

    #[test]
    fn remove_skips_displaced_backend() {
        let size = 50;
        let mut ring = HashRing::new(size).unwrap();
        let first = address_at(20, size);
        let displaced = (0u32..)
            .map(|i| format!("http://172.16.{}.{}:80", i / 256, i % 256))
            .find(|a| hash_slot(a, size) == 20)
            .unwrap();

        ring.add_node(backend(&first)).unwrap();
        let displaced = backend(&displaced);
        assert_eq!(ring.add_node(displaced.clone()).unwrap(), 21);

        assert_eq!(ring.remove_node(&displaced), None);
        assert_eq!(ring.slots(), &[20, 21]);
        assert_eq!(ring.node_at(21).unwrap().address(), displaced.address());
    }

    #[test]
    fn assign_alive_walks_past_dead_nodes() {
        let (ring, placed) = ring_with_slots(50, &[10, 30, 40]);
        placed[1].set_alive(false);
        let got = ring.assign_alive(&key_at(25, 50)).unwrap();
        assert_eq!(got.address(), placed[2].address());

        placed[2].set_alive(false);
        let got = ring.assign_alive(&key_at(25, 50)).unwrap();
        assert_eq!(got.address(), placed[0].address());

        placed[0].set_alive(false);
        assert_eq!(ring.assign_alive(&key_at(25, 50)).unwrap_err(), BalancerError::NoLiveBackend);
    }

    #[test]
    fn balancer_ignores_passed_list() {
        let backends: Vec<_> = (0..3)
            .map(|i| backend(&format!("http://127.0.0.1:{}", 7000 + i)))
            .collect();
        let lb = HashRingBalancer::with_backends(HashRing::new(1024).unwrap(), &backends).unwrap();
        assert_eq!(lb.slots().len(), 3);

        let picked = lb.next_server(&[], "session-1").unwrap();
        assert_eq!(picked.address(), lb.assign("session-1").unwrap().address());
    }

    proptest! {
        #[test]
        fn slots_stay_sorted_and_unique(ports in proptest::collection::hash_set(1u16..u16::MAX, 1..64)) {
            let mut ring = HashRing::new(128).unwrap();
            let mut seen = HashSet::new();
            for port in &ports {
                let b = backend(&format!("http://127.0.0.1:{}", port));
                let slot = ring.add_node(b.clone()).unwrap();
                prop_assert!(slot < 128);
                prop_assert!(seen.insert(slot));
                prop_assert_eq!(ring.node_at(slot).unwrap().address(), b.address());
            }
            prop_assert_eq!(ring.len(), ports.len());
            prop_assert!(ring.slots().windows(2).all(|w| w[0] < w[1]));
            let mut keys: Vec<usize> = seen.into_iter().collect();
            keys.sort_unstable();
            prop_assert_eq!(ring.slots(), keys.as_slice());
        }
    }
}
