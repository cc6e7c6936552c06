//! Mobility state of one forwarding entry.
//!
//! A [`Tfib`] couples the sequence number of the last mobility event seen for
//! a prefix with its next-hop partitions, and mirrors changes to the current
//! next hops into the data-plane adjacencies.

use log::{debug, warn};
use rust_hicn_common::{
    types::{FaceId, Seq, INVALID_SEQ},
    Prefix,
};
use std::fmt;
use std::sync::Arc;

use crate::adjacency::Adjacencies;
use crate::error::MapMeError;
use crate::face::{FaceLock, FaceTable};
use crate::nexthops::{Insertion, NextHopSet};

/// Outcome of [`Tfib::set_current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextHopStatus {
    /// The face became the sole current next hop.
    Replaced,
    /// The face was already a current next hop.
    AlreadyInstalled,
    /// The face could not be installed; the entry has no current next hop.
    NotInstalled,
}

pub struct Tfib {
    prefix: Prefix,
    seq: Seq,
    faces: Arc<dyn FaceTable>,
    nexthops: NextHopSet,
    adjacencies: Arc<dyn Adjacencies>,
}

impl Tfib {
    pub fn new(
        prefix: Prefix,
        faces: Arc<dyn FaceTable>,
        adjacencies: Arc<dyn Adjacencies>,
        capacity: usize,
    ) -> Self {
        Self {
            prefix,
            seq: INVALID_SEQ,
            nexthops: NextHopSet::new(Arc::clone(&faces), capacity),
            faces,
            adjacencies,
        }
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn seq(&self) -> Seq {
        self.seq
    }

    pub fn set_seq(&mut self, seq: Seq) {
        self.seq = seq;
    }

    pub fn nexthops(&self) -> &NextHopSet {
        &self.nexthops
    }

    pub fn current(&self) -> Vec<FaceId> {
        self.nexthops.current()
    }

    pub fn previous(&self) -> Vec<FaceId> {
        self.nexthops.previous()
    }

    /// Whether `face` is a previous hop.
    pub fn has(&self, face: FaceId) -> bool {
        self.nexthops.has_previous(face)
    }

    pub fn has_current(&self, face: FaceId) -> bool {
        self.nexthops.has_current(face)
    }

    pub fn add_previous(&mut self, face: FaceId) -> Result<Insertion, MapMeError> {
        self.nexthops.add_previous(face)
    }

    pub fn remove_previous(&mut self, face: FaceId) -> bool {
        self.nexthops.remove_previous(face)
    }

    pub fn clear_previous(&mut self) {
        self.nexthops.clear_previous()
    }

    /// Add `face` to the current next hops and install its adjacency.
    ///
    /// A previous hop is promoted in place, keeping its lock.
    pub fn add_current(&mut self, face: FaceId) -> Result<Insertion, MapMeError> {
        if self.nexthops.has_current(face) {
            return Ok(Insertion::AlreadyPresent);
        }
        self.adjacencies.install_nexthop(&self.prefix, face)?;

        if self.nexthops.promote(face) {
            return Ok(Insertion::Added);
        }
        match self.nexthops.add_current(face) {
            Ok(insertion) => Ok(insertion),
            Err(err) => {
                self.adjacencies.remove_nexthop(&self.prefix, face);
                Err(err)
            }
        }
    }

    pub fn remove_current(&mut self, face: FaceId) -> bool {
        let removed = self.nexthops.remove_current(face);
        if removed {
            self.adjacencies.remove_nexthop(&self.prefix, face);
        }
        removed
    }

    /// Make `face` the only current next hop.
    ///
    /// The new next hop is locked and installed before the former ones are
    /// withdrawn. If no slot is free the oldest previous hop is given up.
    pub fn set_current(&mut self, face: FaceId) -> NextHopStatus {
        if self.nexthops.current_is_exactly(face) {
            return NextHopStatus::AlreadyInstalled;
        }

        let mut former = self.nexthops.take_current();
        let kept = former
            .iter()
            .position(|lock| lock.face() == face)
            .map(|index| former.swap_remove(index));

        let status = match kept {
            Some(lock) => {
                self.reinsert(lock);
                NextHopStatus::AlreadyInstalled
            }
            None => self.install(face),
        };

        for lock in former {
            self.adjacencies.remove_nexthop(&self.prefix, lock.face());
            debug!("{}: withdrew next hop {}", self.prefix, lock.face());
        }
        status
    }

    /// Apply a mobility event with sequence number `seq` received from
    /// `face`: the face becomes the sole current next hop and every other
    /// current next hop becomes a previous hop.
    ///
    /// A face that was a previous hop is promoted with its lock, it is never
    /// left unreferenced in between. Adjacencies of the demoted next hops are
    /// withdrawn only once `face` is installed.
    pub fn update_location(&mut self, seq: Seq, face: FaceId) -> NextHopStatus {
        self.seq = seq;
        let demoted = self.nexthops.demote_current_except(face);
        let status = self.set_current(face);
        for former in demoted {
            self.adjacencies.remove_nexthop(&self.prefix, former);
            debug!("{}: withdrew next hop {}", self.prefix, former);
        }
        status
    }

    fn reinsert(&mut self, lock: FaceLock) {
        if let Err(err) = self.nexthops.insert_current(lock) {
            // The partition was just emptied so there is always room.
            warn!("{}: failed to keep current next hop: {}", self.prefix, err);
        }
    }

    fn install(&mut self, face: FaceId) -> NextHopStatus {
        if let Err(err) = self.adjacencies.install_nexthop(&self.prefix, face) {
            warn!("{}: cannot install next hop: {}", self.prefix, err);
            return NextHopStatus::NotInstalled;
        }
        if self.nexthops.promote(face) {
            return NextHopStatus::Replaced;
        }

        let lock = match FaceLock::acquire(&self.faces, face) {
            Ok(lock) => lock,
            Err(err) => {
                self.adjacencies.remove_nexthop(&self.prefix, face);
                warn!("{}: cannot install next hop: {}", self.prefix, err);
                return NextHopStatus::NotInstalled;
            }
        };
        if self.nexthops.free() == 0 {
            if let Some(evicted) = self.nexthops.evict_oldest_previous() {
                warn!(
                    "{}: next hops full, forgetting previous hop {}",
                    self.prefix, evicted
                );
            }
        }
        match self.nexthops.insert_current(lock) {
            Ok(()) => NextHopStatus::Replaced,
            Err(err) => {
                self.adjacencies.remove_nexthop(&self.prefix, face);
                warn!("{}: cannot install next hop: {}", self.prefix, err);
                NextHopStatus::NotInstalled
            }
        }
    }
}

impl fmt::Debug for Tfib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tfib")
            .field("prefix", &self.prefix)
            .field("seq", &self.seq)
            .field("nexthops", &self.nexthops)
            .finish()
    }
}
