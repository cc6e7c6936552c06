//! Control message processing.
//!
//! An incoming Interest Update is compared against the sequence number of
//! the forwarding entry it names:
//!
//! - newer: the ingress face becomes the sole current next hop and the
//!   former next hops become previous hops (`FACE_NH_SET`);
//! - equal: the ingress face is one more current next hop (`FACE_NH_ADD`);
//! - older: the ingress face is behind and is recorded as a previous hop so
//!   that it gets updated (`FACE_PH_ADD`).
//!
//! The packet buffer is turned into the acknowledgment in place; the caller
//! sends it back on the ingress face.

use bytes::BytesMut;
use log::{debug, trace, warn};
use rust_hicn_common::{message::MapMeParams, types::FaceId, Prefix};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::MapMeError;
use crate::eventmgr::Event;
use crate::fib::{ForwardingEntry, ForwardingObject};
use crate::nexthops::Insertion;
use crate::tfib::NextHopStatus;
use crate::MapMe;

/// Where a control packet came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingress {
    pub face: FaceId,
    /// The face was created for this packet and its creator reference is
    /// still held.
    pub new_face: bool,
}

impl Ingress {
    pub fn new(face: FaceId) -> Self {
        Self {
            face,
            new_face: false,
        }
    }

    pub fn new_face(face: FaceId) -> Self {
        Self {
            face,
            new_face: true,
        }
    }
}

/// What processing a control message did to the forwarding entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Newer sequence number.
    NextHopSet(NextHopStatus),
    /// Same sequence number. `None` when the face could not be added.
    NextHopAdded(Option<Insertion>),
    /// Older sequence number from a face that is not a current next hop.
    /// `None` when the face could not be recorded.
    PreviousHopAdded(Option<Insertion>),
    /// Older sequence number from a current next hop.
    StaleIgnored,
    /// Acknowledgment of an IU sent by this node.
    AckReceived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtrlOutcome {
    pub prefix: Prefix,
    pub params: MapMeParams,
    pub decision: Decision,
    /// Face to send the forged acknowledgment on.
    pub reply: Option<FaceId>,
}

impl MapMe {
    /// Process a MAP-Me control packet received on `ingress`.
    ///
    /// On success an IU has been rewritten into its acknowledgment and
    /// `reply` names the face to send it on. On error the packet must be
    /// dropped.
    pub fn process_ctrl(
        &self,
        packet: &mut BytesMut,
        ingress: Ingress,
    ) -> Result<CtrlOutcome, MapMeError> {
        self.metrics.ctrl_received.increment();
        if !self.config.enabled {
            self.metrics.ctrl_disabled.increment();
            return Err(MapMeError::Disabled);
        }

        let (prefix, params) = self.codec.decode(packet).map_err(|err| {
            self.metrics.ctrl_decode_errors.increment();
            debug!("Dropping control packet from {}: {}", ingress.face, err);
            err
        })?;
        trace!("{} {} seq {} from {}", params.kind, prefix, params.seq, ingress.face);

        if params.kind.is_ack() {
            return self.process_ack(prefix, params, ingress.face);
        }

        self.codec.forge_ack(packet, &params).map_err(|err| {
            self.metrics.ctrl_decode_errors.increment();
            err
        })?;

        let entry = self.resolve(&prefix)?;
        let (decision, event) = self.apply(&entry, params, ingress);

        if let Some(event) = event {
            // Drops are accounted for by the sender.
            let _ = self.events.notify(event);
        }
        self.metrics.acks_forged.increment();

        Ok(CtrlOutcome {
            prefix,
            params,
            decision,
            reply: Some(ingress.face),
        })
    }

    fn process_ack(
        &self,
        prefix: Prefix,
        params: MapMeParams,
        face: FaceId,
    ) -> Result<CtrlOutcome, MapMeError> {
        self.metrics.acks_received.increment();
        let entry = self.resolve(&prefix)?;
        let _ = self.events.notify(Event::FacePhDel {
            entry,
            face,
            seq: params.seq,
        });
        Ok(CtrlOutcome {
            prefix,
            params,
            decision: Decision::AckReceived,
            reply: None,
        })
    }

    pub(crate) fn resolve(&self, prefix: &Prefix) -> Result<Arc<ForwardingEntry>, MapMeError> {
        match self.fib.lookup(prefix) {
            Some(ForwardingObject::Hicn(entry)) => Ok(entry),
            Some(ForwardingObject::Locator(_)) => {
                self.metrics.ctrl_unsupported.increment();
                debug!("{} is not an hICN prefix", prefix);
                Err(MapMeError::UnsupportedForwardingObject(*prefix))
            }
            None => {
                self.metrics.ctrl_prefix_not_found.increment();
                debug!("No FIB entry for {}", prefix);
                Err(MapMeError::PrefixNotFound(*prefix))
            }
        }
    }

    fn apply(
        &self,
        entry: &Arc<ForwardingEntry>,
        params: MapMeParams,
        ingress: Ingress,
    ) -> (Decision, Option<Event>) {
        let face = ingress.face;
        let mut tfib = entry.lock();
        let fib_seq = tfib.seq();

        let (decision, gained, kind) = match params.seq.cmp(&fib_seq) {
            Ordering::Greater => {
                let status = tfib.update_location(params.seq, face);
                self.metrics.nh_set.increment();
                debug!(
                    "{}: seq {} -> {}, next hop set to {} ({:?})",
                    entry.prefix(),
                    fib_seq,
                    params.seq,
                    face,
                    status
                );
                (
                    Decision::NextHopSet(status),
                    status == NextHopStatus::Replaced,
                    Some(Kind::NhSet),
                )
            }
            Ordering::Equal => {
                // Adding first keeps the face referenced while it moves out of
                // the previous hops.
                let insertion = match tfib.add_current(face) {
                    Ok(insertion) => {
                        tfib.remove_previous(face);
                        Some(insertion)
                    }
                    Err(err) => {
                        self.warn_failure(entry.prefix(), face, &err);
                        None
                    }
                };
                self.metrics.nh_add.increment();
                debug!("{}: next hop {} added at seq {}", entry.prefix(), face, fib_seq);
                (
                    Decision::NextHopAdded(insertion),
                    insertion == Some(Insertion::Added),
                    Some(Kind::NhAdd),
                )
            }
            Ordering::Less if tfib.has_current(face) => {
                self.metrics.stale_ignored.increment();
                trace!(
                    "{}: stale seq {} from current next hop {}",
                    entry.prefix(),
                    params.seq,
                    face
                );
                (Decision::StaleIgnored, false, None)
            }
            Ordering::Less => {
                let insertion = match tfib.add_previous(face) {
                    Ok(insertion) => Some(insertion),
                    Err(err) => {
                        self.warn_failure(entry.prefix(), face, &err);
                        None
                    }
                };
                self.metrics.ph_add.increment();
                debug!(
                    "{}: {} is behind (seq {} < {})",
                    entry.prefix(),
                    face,
                    params.seq,
                    fib_seq
                );
                (
                    Decision::PreviousHopAdded(insertion),
                    insertion == Some(Insertion::Added),
                    Some(Kind::PhAdd),
                )
            }
        };
        drop(tfib);

        if ingress.new_face && gained {
            // The entry now holds its own reference.
            self.faces.unlock(face);
            trace!("Released creation lock of {}", face);
        }

        let entry = Arc::clone(entry);
        let event = kind.map(|kind| match kind {
            Kind::NhSet => Event::FaceNhSet { entry, face },
            Kind::NhAdd => Event::FaceNhAdd { entry, face },
            Kind::PhAdd => Event::FacePhAdd { entry, face },
        });
        (decision, event)
    }

    fn warn_failure(&self, prefix: &Prefix, face: FaceId, err: &MapMeError) {
        if let MapMeError::CapacityExceeded(_) = err {
            self.metrics.capacity_exceeded.increment();
        }
        warn!("{}: cannot record {}: {}", prefix, face, err);
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    NhSet,
    NhAdd,
    PhAdd,
}
