//! Bounded next-hop storage of a forwarding entry.
//!
//! One pool of `capacity` slots is shared by two partitions: the current next
//! hops, used for forwarding, and the previous hops (the TFIB), which still
//! have to be told about the new producer location. Each slot owns a
//! [`FaceLock`], so a face stays locked exactly as long as one partition
//! refers to it.

use log::trace;
use rust_hicn_common::types::FaceId;
use std::fmt;
use std::sync::Arc;

use crate::error::MapMeError;
use crate::face::{FaceLock, FaceTable};

/// Result of an idempotent insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Added,
    AlreadyPresent,
}

pub struct NextHopSet {
    faces: Arc<dyn FaceTable>,
    capacity: usize,
    current: Vec<FaceLock>,
    /// Oldest first.
    previous: Vec<FaceLock>,
}

impl NextHopSet {
    pub fn new(faces: Arc<dyn FaceTable>, capacity: usize) -> Self {
        Self {
            faces,
            capacity,
            current: Vec::with_capacity(capacity),
            previous: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn current(&self) -> Vec<FaceId> {
        self.current.iter().map(FaceLock::face).collect()
    }

    pub fn previous(&self) -> Vec<FaceId> {
        self.previous.iter().map(FaceLock::face).collect()
    }

    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    pub fn previous_len(&self) -> usize {
        self.previous.len()
    }

    /// Slots not used by either partition.
    pub fn free(&self) -> usize {
        self.capacity - self.current.len() - self.previous.len()
    }

    /// Whether `face` is a previous hop.
    pub fn has_previous(&self, face: FaceId) -> bool {
        self.previous.iter().any(|lock| lock.face() == face)
    }

    pub fn has_current(&self, face: FaceId) -> bool {
        self.current.iter().any(|lock| lock.face() == face)
    }

    pub fn current_is_exactly(&self, face: FaceId) -> bool {
        self.current.len() == 1 && self.current[0].face() == face
    }

    /* ---------------------------------------------------------------- *
     * Previous hops
     * ---------------------------------------------------------------- */

    /// Record `face` as a previous hop, locking it.
    pub fn add_previous(&mut self, face: FaceId) -> Result<Insertion, MapMeError> {
        if self.has_previous(face) {
            return Ok(Insertion::AlreadyPresent);
        }
        if self.previous.len() >= self.capacity - self.current.len() {
            return Err(MapMeError::CapacityExceeded(self.capacity));
        }
        let lock = FaceLock::acquire(&self.faces, face)?;
        self.previous.push(lock);
        self.check_invariants();
        Ok(Insertion::Added)
    }

    /// Drop `face` from the previous hops, unlocking it.
    pub fn remove_previous(&mut self, face: FaceId) -> bool {
        match self.previous.iter().position(|lock| lock.face() == face) {
            Some(index) => {
                // Keep the remaining hops in insertion order.
                self.previous.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear_previous(&mut self) {
        trace!("Clearing {} previous hops", self.previous.len());
        self.previous.clear();
    }

    /// Drop the oldest previous hop to make room, returning it.
    pub fn evict_oldest_previous(&mut self) -> Option<FaceId> {
        if self.previous.is_empty() {
            return None;
        }
        Some(self.previous.remove(0).face())
    }

    /* ---------------------------------------------------------------- *
     * Current next hops
     * ---------------------------------------------------------------- */

    /// Append `face` to the current next hops, locking it.
    pub fn add_current(&mut self, face: FaceId) -> Result<Insertion, MapMeError> {
        if self.has_current(face) {
            return Ok(Insertion::AlreadyPresent);
        }
        if self.free() == 0 {
            return Err(MapMeError::CapacityExceeded(self.capacity));
        }
        let lock = FaceLock::acquire(&self.faces, face)?;
        self.current.push(lock);
        self.check_invariants();
        Ok(Insertion::Added)
    }

    pub fn remove_current(&mut self, face: FaceId) -> bool {
        match self.current.iter().position(|lock| lock.face() == face) {
            Some(index) => {
                self.current.remove(index);
                true
            }
            None => false,
        }
    }

    /// Move `face` from the previous hops to the current ones. The lock moves
    /// with it, so the face is never left unreferenced.
    pub fn promote(&mut self, face: FaceId) -> bool {
        match self.previous.iter().position(|lock| lock.face() == face) {
            Some(index) => {
                let lock = self.previous.remove(index);
                self.current.push(lock);
                self.check_invariants();
                true
            }
            None => false,
        }
    }

    /// Move every current next hop but `keep` to the previous hops and return
    /// the faces moved.
    pub fn demote_current_except(&mut self, keep: FaceId) -> Vec<FaceId> {
        let mut demoted = Vec::new();
        let mut kept = Vec::with_capacity(1);
        for lock in self.current.drain(..) {
            if lock.face() == keep {
                kept.push(lock);
            } else {
                demoted.push(lock.face());
                self.previous.push(lock);
            }
        }
        self.current = kept;
        self.check_invariants();
        demoted
    }

    /// Empty the current partition, handing the locks to the caller.
    pub(crate) fn take_current(&mut self) -> Vec<FaceLock> {
        std::mem::take(&mut self.current)
    }

    /// Install an already acquired lock as a current next hop. The lock is
    /// released if there is no room.
    pub(crate) fn insert_current(&mut self, lock: FaceLock) -> Result<(), MapMeError> {
        if self.has_current(lock.face()) {
            return Ok(());
        }
        if self.free() == 0 {
            return Err(MapMeError::CapacityExceeded(self.capacity));
        }
        self.current.push(lock);
        self.check_invariants();
        Ok(())
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.current.len() + self.previous.len() <= self.capacity,
            "next hop partitions exceed capacity"
        );
        debug_assert!(
            self.current
                .iter()
                .all(|lock| !self.has_previous(lock.face())),
            "face present in both partitions"
        );
    }
}

impl fmt::Debug for NextHopSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NextHopSet")
            .field("capacity", &self.capacity)
            .field("current", &self.current())
            .field("previous", &self.previous())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::Faces;
    use rust_hicn_common::types::{FaceKind, FaceProto};

    fn setup(capacity: usize, faces: usize) -> (Arc<Faces>, NextHopSet, Vec<FaceId>) {
        let table = Arc::new(Faces::new());
        let ids = (0..faces)
            .map(|_| table.create(FaceKind::Ip, FaceProto::Ip6))
            .collect();
        let set = NextHopSet::new(table.clone(), capacity);
        (table, set, ids)
    }

    #[test]
    fn test_add_previous_is_idempotent() {
        let (table, mut set, ids) = setup(4, 1);
        let a = ids[0];

        assert_eq!(set.add_previous(a).unwrap(), Insertion::Added);
        assert_eq!(table.locks(a), Some(2));
        assert_eq!(set.add_previous(a).unwrap(), Insertion::AlreadyPresent);
        assert_eq!(table.locks(a), Some(2));
        assert_eq!(set.previous(), vec![a]);
    }

    #[test]
    fn test_add_previous_capacity_exceeded() {
        let (table, mut set, ids) = setup(4, 5);
        for face in &ids[..4] {
            set.add_current(*face).unwrap();
        }

        let err = set.add_previous(ids[4]).unwrap_err();
        assert_eq!(err, MapMeError::CapacityExceeded(4));
        assert!(set.previous().is_empty());
        assert_eq!(set.current(), ids[..4].to_vec());
        assert_eq!(table.locks(ids[4]), Some(1));
    }

    #[test]
    fn test_remove_previous_keeps_order() {
        let (table, mut set, ids) = setup(4, 3);
        for face in &ids {
            set.add_previous(*face).unwrap();
        }

        assert!(set.remove_previous(ids[1]));
        assert!(!set.remove_previous(ids[1]));
        assert_eq!(set.previous(), vec![ids[0], ids[2]]);
        assert_eq!(table.locks(ids[1]), Some(1));
    }

    #[test]
    fn test_clear_previous_unlocks() {
        let (table, mut set, ids) = setup(4, 2);
        set.add_previous(ids[0]).unwrap();
        set.add_previous(ids[1]).unwrap();

        set.clear_previous();
        assert_eq!(set.previous_len(), 0);
        assert!(ids.iter().all(|face| table.locks(*face) == Some(1)));
    }

    #[test]
    fn test_add_current_is_idempotent() {
        let (table, mut set, ids) = setup(2, 3);
        assert_eq!(set.add_current(ids[0]).unwrap(), Insertion::Added);
        assert_eq!(set.add_current(ids[0]).unwrap(), Insertion::AlreadyPresent);
        assert_eq!(table.locks(ids[0]), Some(2));

        set.add_current(ids[1]).unwrap();
        assert!(matches!(
            set.add_current(ids[2]),
            Err(MapMeError::CapacityExceeded(2))
        ));
    }

    #[test]
    fn test_promote_and_demote_move_locks() {
        let (table, mut set, ids) = setup(4, 3);
        set.add_current(ids[0]).unwrap();
        set.add_current(ids[1]).unwrap();
        set.add_previous(ids[2]).unwrap();

        assert!(set.promote(ids[2]));
        assert_eq!(set.current(), vec![ids[0], ids[1], ids[2]]);
        assert!(!set.has_previous(ids[2]));

        let demoted = set.demote_current_except(ids[2]);
        assert_eq!(demoted, vec![ids[0], ids[1]]);
        assert!(set.current_is_exactly(ids[2]));
        assert_eq!(set.previous(), vec![ids[0], ids[1]]);
        assert!(ids.iter().all(|face| table.locks(*face) == Some(2)));
    }

    #[test]
    fn test_evict_oldest_previous() {
        let (table, mut set, ids) = setup(4, 2);
        assert_eq!(set.evict_oldest_previous(), None);
        set.add_previous(ids[0]).unwrap();
        set.add_previous(ids[1]).unwrap();

        assert_eq!(set.evict_oldest_previous(), Some(ids[0]));
        assert_eq!(set.previous(), vec![ids[1]]);
        assert_eq!(table.locks(ids[0]), Some(1));
    }

    #[test]
    fn test_dropping_set_releases_every_lock() {
        let (table, mut set, ids) = setup(4, 2);
        set.add_current(ids[0]).unwrap();
        set.add_previous(ids[1]).unwrap();

        drop(set);
        assert!(ids.iter().all(|face| table.locks(*face) == Some(1)));
    }
}
