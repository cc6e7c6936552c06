//! MAP-Me: anchorless producer mobility for hICN.
//!
//! A [`MapMe`] instance owns the mobility logic of one forwarder. It is
//! created together with its [`EventManager`], which the caller spawns on
//! the tokio runtime:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use rust_hicn_mapme::*;
//! # async fn demo(transmitter: Arc<dyn Transmitter>) {
//! let faces = Arc::new(Faces::new());
//! let adjacencies = Arc::new(AdjacencyTable::new(faces.clone()));
//! let fib = Arc::new(Fib::new(faces.clone(), adjacencies, rust_hicn_common::types::MAX_NEXTHOPS));
//!
//! let (mapme, manager) = MapMe::new(
//!     MapMeConfig::default(),
//!     faces,
//!     fib,
//!     Arc::new(TlvCodec),
//!     transmitter,
//! );
//! tokio::spawn(manager.run());
//! # let _ = mapme;
//! # }
//! ```
//!
//! Packets are fed through [`MapMe::process_ctrl`]; the resulting events are
//! handled asynchronously.

pub mod adjacency;
pub mod codec;
pub mod config;
pub mod ctrl;
pub mod error;
pub mod eventmgr;
pub mod face;
pub mod fib;
pub mod nexthops;
pub mod tfib;

#[cfg(test)]
mod testutil;

use log::{debug, info};
use rust_hicn_common::{
    metrics::MapMeMetrics,
    types::{FaceId, FaceKind, Seq, INVALID_SEQ},
    Prefix,
};
use std::sync::Arc;

pub use adjacency::{Adjacencies, AdjacencyTable};
pub use codec::{Codec, TlvCodec};
pub use config::MapMeConfig;
pub use ctrl::{CtrlOutcome, Decision, Ingress};
pub use error::MapMeError;
pub use eventmgr::{Event, EventKind, EventManager, EventSender, Transmitter};
pub use face::{FaceDescriptor, FaceLock, FaceTable, Faces};
pub use fib::{Fib, ForwardingEntry, ForwardingObject, Lookup};
pub use nexthops::{Insertion, NextHopSet};
pub use tfib::{NextHopStatus, Tfib};

/// MAP-Me context of one forwarder.
pub struct MapMe {
    config: MapMeConfig,
    faces: Arc<dyn FaceTable>,
    fib: Arc<dyn Lookup>,
    codec: Arc<dyn Codec>,
    events: EventSender,
    metrics: Arc<MapMeMetrics>,
}

impl MapMe {
    pub fn new(
        config: MapMeConfig,
        faces: Arc<dyn FaceTable>,
        fib: Arc<dyn Lookup>,
        codec: Arc<dyn Codec>,
        transmitter: Arc<dyn Transmitter>,
    ) -> (Self, EventManager) {
        let metrics = Arc::new(MapMeMetrics::new());
        let (events, manager) = eventmgr::channel(
            config.clone(),
            Arc::clone(&faces),
            Arc::clone(&codec),
            transmitter,
            Arc::clone(&metrics),
        );
        let mapme = Self {
            config,
            faces,
            fib,
            codec,
            events,
            metrics,
        };
        (mapme, manager)
    }

    pub fn config(&self) -> &MapMeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MapMeMetrics> {
        &self.metrics
    }

    /// Handle for raising events from outside the control path.
    pub fn events(&self) -> &EventSender {
        &self.events
    }

    /// A local producer serves `prefix` behind `face`.
    ///
    /// Bumps the sequence number of the entry, makes `face` its only current
    /// next hop and schedules IUs towards the former locations. Returns the
    /// new sequence number.
    pub fn announce_producer(&self, prefix: &Prefix, face: FaceId) -> Result<Seq, MapMeError> {
        if !self.faces.is_valid(face) {
            return Err(MapMeError::FaceInvalid(face));
        }
        let entry = self.resolve(prefix)?;

        let (seq, status) = {
            let mut tfib = entry.lock();
            let mut seq = tfib.seq().wrapping_add(1);
            if seq == INVALID_SEQ {
                seq += 1;
            }
            (seq, tfib.update_location(seq, face))
        };
        if status == NextHopStatus::NotInstalled {
            return Err(MapMeError::FaceInvalid(face));
        }

        info!("Producer for {} announced on {} with seq {}", prefix, face, seq);
        self.events.notify(Event::FaceAppAdd { entry, face })?;
        Ok(seq)
    }

    /// Re-announce every prefix currently reached through `face`. Returns
    /// the number of prefixes scheduled.
    pub fn send_update(&self, face: FaceId) -> usize {
        let mut scheduled = 0;
        for entry in self.fib.entries() {
            if !entry.lock().has_current(face) {
                continue;
            }
            match self.events.notify(Event::FaceNhSet { entry, face }) {
                Ok(()) => scheduled += 1,
                Err(err) => debug!("Update on {} not scheduled: {}", face, err),
            }
        }
        info!("Scheduled updates for {} prefix(es) on {}", scheduled, face);
        scheduled
    }

    pub fn face_added(&self, face: FaceId) -> Result<(), MapMeError> {
        self.events.notify(Event::FaceAdd(face))
    }

    /// Cancels pending IUs towards a face that is going away.
    pub fn face_deleted(&self, face: FaceId, kind: FaceKind) -> Result<(), MapMeError> {
        let event = match kind {
            FaceKind::App => Event::FaceAppDel(face),
            FaceKind::Ip | FaceKind::Udp => Event::FaceDel(face),
        };
        self.events.notify(event)
    }
}
