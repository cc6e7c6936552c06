//! MAP-Me event manager.
//!
//! Events raised by the control processor are queued on a bounded channel
//! and consumed by a single task which forges Interest Updates, sends them
//! through the [`Transmitter`] and retransmits them until they are
//! acknowledged or the retry budget is exhausted.
//!
//! Retransmission timers post their expiry on the same channel, so a timer
//! fire and an ack for the same IU are always handled in arrival order by the
//! one consumer. Each timer carries a generation number; a fire for an IU that
//! was replaced or acknowledged in the meantime is ignored.

use bytes::Bytes;
use log::{debug, info, trace, warn};
use rust_hicn_common::{
    message::MapMeParams,
    metrics::MapMeMetrics,
    types::{FaceId, Seq},
    Prefix,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::codec::Codec;
use crate::config::MapMeConfig;
use crate::error::MapMeError;
use crate::face::FaceTable;
use crate::fib::ForwardingEntry;

/* ---------------------------------------------------------------- *
 * Events
 * ---------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FaceAdd,
    FaceDel,
    FaceAppAdd,
    FaceAppDel,
    FaceNhSet,
    FaceNhAdd,
    FacePhAdd,
    FacePhDel,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::FaceAdd => "FACE_ADD",
            EventKind::FaceDel => "FACE_DEL",
            EventKind::FaceAppAdd => "FACE_APP_ADD",
            EventKind::FaceAppDel => "FACE_APP_DEL",
            EventKind::FaceNhSet => "FACE_NH_SET",
            EventKind::FaceNhAdd => "FACE_NH_ADD",
            EventKind::FacePhAdd => "FACE_PH_ADD",
            EventKind::FacePhDel => "FACE_PH_DEL",
        };
        f.write_str(s)
    }
}

/// A mobility event. Entry-bound events carry the face that triggered them.
#[derive(Debug, Clone)]
pub enum Event {
    FaceAdd(FaceId),
    FaceDel(FaceId),
    /// A local producer appeared behind `face`.
    FaceAppAdd {
        entry: Arc<ForwardingEntry>,
        face: FaceId,
    },
    FaceAppDel(FaceId),
    /// `face` became the sole current next hop.
    FaceNhSet {
        entry: Arc<ForwardingEntry>,
        face: FaceId,
    },
    /// `face` was added to the current next hops.
    FaceNhAdd {
        entry: Arc<ForwardingEntry>,
        face: FaceId,
    },
    /// `face` sent stale information and must be updated.
    FacePhAdd {
        entry: Arc<ForwardingEntry>,
        face: FaceId,
    },
    /// `face` acknowledged the IU carrying `seq`.
    FacePhDel {
        entry: Arc<ForwardingEntry>,
        face: FaceId,
        seq: Seq,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::FaceAdd(_) => EventKind::FaceAdd,
            Event::FaceDel(_) => EventKind::FaceDel,
            Event::FaceAppAdd { .. } => EventKind::FaceAppAdd,
            Event::FaceAppDel(_) => EventKind::FaceAppDel,
            Event::FaceNhSet { .. } => EventKind::FaceNhSet,
            Event::FaceNhAdd { .. } => EventKind::FaceNhAdd,
            Event::FacePhAdd { .. } => EventKind::FacePhAdd,
            Event::FacePhDel { .. } => EventKind::FacePhDel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RetxKey {
    prefix: Prefix,
    face: FaceId,
}

#[derive(Debug)]
enum Message {
    Event(Event),
    Timeout { key: RetxKey, generation: u64 },
}

/// Sends control packets out of a face.
pub trait Transmitter: Send + Sync {
    fn transmit(&self, face: FaceId, packet: Bytes) -> Result<(), MapMeError>;
}

/// Producer side of the event queue. Never blocks.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Message>,
    metrics: Arc<MapMeMetrics>,
}

impl EventSender {
    /// Queue `event`. When the queue is full the event is dropped.
    pub fn notify(&self, event: Event) -> Result<(), MapMeError> {
        let kind = event.kind();
        match self.tx.try_send(Message::Event(event)) {
            Ok(()) => {
                self.metrics.events_enqueued.increment();
                trace!("Queued {}", kind);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.events_dropped.increment();
                warn!("MAP-Me event queue full, dropping {}", kind);
                Err(MapMeError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(MapMeError::Closed),
        }
    }
}

/* ---------------------------------------------------------------- *
 * In-flight Interest Updates
 * ---------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetxState {
    Sent,
    Retransmit,
}

/// Retransmission timer, cancelled on drop.
#[derive(Debug)]
struct RetxTimer(JoinHandle<()>);

impl Drop for RetxTimer {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct InFlight {
    entry: Arc<ForwardingEntry>,
    seq: Seq,
    attempts_remaining: u32,
    state: RetxState,
    /// The target was a previous hop when the IU was first sent.
    was_previous: bool,
    generation: u64,
    first_sent: Instant,
    _timer: RetxTimer,
}

pub struct EventManager {
    rx: mpsc::Receiver<Message>,
    timers: mpsc::WeakSender<Message>,
    config: MapMeConfig,
    faces: Arc<dyn FaceTable>,
    codec: Arc<dyn Codec>,
    transmitter: Arc<dyn Transmitter>,
    metrics: Arc<MapMeMetrics>,
    in_flight: HashMap<RetxKey, InFlight>,
    generation: u64,
}

/// Create the event queue: the sender for producers and the manager owning
/// the consumer side.
pub fn channel(
    config: MapMeConfig,
    faces: Arc<dyn FaceTable>,
    codec: Arc<dyn Codec>,
    transmitter: Arc<dyn Transmitter>,
    metrics: Arc<MapMeMetrics>,
) -> (EventSender, EventManager) {
    let (tx, rx) = mpsc::channel(config.event_queue_size);
    let manager = EventManager {
        rx,
        timers: tx.downgrade(),
        config,
        faces,
        codec,
        transmitter,
        metrics: Arc::clone(&metrics),
        in_flight: HashMap::new(),
        generation: 0,
    };
    (EventSender { tx, metrics }, manager)
}

impl EventManager {
    /// Process events until every [`EventSender`] is gone.
    pub async fn run(mut self) {
        info!(
            "MAP-Me event manager started (retx {} ms x{})",
            self.config.retx_ms, self.config.retx_count
        );
        while let Some(message) = self.rx.recv().await {
            self.dispatch(message);
        }
        info!(
            "MAP-Me event manager stopped, {} IU(s) abandoned",
            self.in_flight.len()
        );
    }

    /// Number of IUs awaiting an acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Pop the next queued event without processing it.
    #[cfg(test)]
    pub(crate) fn try_next_event(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv().ok()? {
                Message::Event(event) => return Some(event),
                Message::Timeout { .. } => continue,
            }
        }
    }

    fn dispatch(&mut self, message: Message) {
        match message {
            Message::Event(event) => self.handle_event(event),
            Message::Timeout { key, generation } => self.on_timeout(key, generation),
        }
        self.metrics.iu_in_flight.set(self.in_flight.len() as u64);
    }

    fn handle_event(&mut self, event: Event) {
        debug!("Processing {}", event.kind());
        match event {
            Event::FaceAdd(face) => debug!("Face {} added", face),
            Event::FaceDel(face) | Event::FaceAppDel(face) => self.cancel_face(face),
            Event::FaceNhSet { entry, face } | Event::FaceAppAdd { entry, face } => {
                let (current, previous) = {
                    let tfib = entry.lock();
                    (tfib.current(), tfib.previous())
                };
                let targets = previous
                    .into_iter()
                    .chain(current.into_iter().filter(|nh| *nh != face));
                for target in targets {
                    self.send_update(&entry, target);
                }
            }
            Event::FaceNhAdd { entry, .. } => {
                // Other current next hops are not updated: they would install
                // this node as a next hop and loop.
                let previous = entry.lock().previous();
                for target in previous {
                    self.send_update(&entry, target);
                }
            }
            Event::FacePhAdd { entry, face } => self.send_update(&entry, face),
            Event::FacePhDel { entry, face, seq } => self.on_ack(&entry, face, seq),
        }
    }

    fn send_update(&mut self, entry: &Arc<ForwardingEntry>, face: FaceId) {
        let key = RetxKey {
            prefix: *entry.prefix(),
            face,
        };
        let (seq, was_previous) = {
            let tfib = entry.lock();
            (tfib.seq(), tfib.has(face))
        };

        if let Some(pending) = self.in_flight.get(&key) {
            if pending.seq >= seq {
                trace!("IU {} seq {} to {} already in flight", key.prefix, seq, face);
                return;
            }
        }
        if !self.faces.is_valid(face) {
            debug!("Not sending IU for {} to invalid face {}", key.prefix, face);
            return;
        }

        self.transmit(&key, seq);
        self.metrics.iu_sent.increment();

        let generation = self.next_generation();
        let timer = self.arm(key, generation);
        let replaced = self.in_flight.insert(
            key,
            InFlight {
                entry: Arc::clone(entry),
                seq,
                attempts_remaining: self.config.retx_count,
                state: RetxState::Sent,
                was_previous,
                generation,
                first_sent: Instant::now(),
                _timer: timer,
            },
        );
        if let Some(old) = replaced {
            debug!(
                "IU {} seq {} to {} superseded by seq {}",
                key.prefix, old.seq, face, seq
            );
        }
    }

    fn on_timeout(&mut self, key: RetxKey, generation: u64) {
        let Some(pending) = self.in_flight.get(&key) else {
            return;
        };
        if pending.generation != generation {
            trace!("Ignoring stale timer for {} on {}", key.prefix, key.face);
            return;
        }

        let attempts_remaining = pending.attempts_remaining;
        let pending_seq = pending.seq;
        let (seq, relevant) = {
            let tfib = pending.entry.lock();
            let relevant = !pending.was_previous || tfib.has(key.face);
            (tfib.seq(), relevant)
        };

        if !self.faces.is_valid(key.face) {
            self.in_flight.remove(&key);
            self.metrics.iu_cancelled.increment();
            debug!("Face {} gone, cancelling IU for {}", key.face, key.prefix);
            return;
        }
        if !relevant {
            self.in_flight.remove(&key);
            self.metrics.iu_cancelled.increment();
            debug!("{} no longer a previous hop for {}", key.face, key.prefix);
            return;
        }
        if attempts_remaining == 0 {
            self.in_flight.remove(&key);
            self.metrics.iu_expired.increment();
            warn!(
                "IU for {} seq {} to {} expired without ack",
                key.prefix, pending_seq, key.face
            );
            return;
        }

        self.transmit(&key, seq);
        self.metrics.iu_retransmitted.increment();

        let generation = self.next_generation();
        let timer = self.arm(key, generation);
        if let Some(pending) = self.in_flight.get_mut(&key) {
            pending.attempts_remaining -= 1;
            pending.seq = seq;
            pending.state = RetxState::Retransmit;
            pending.generation = generation;
            pending._timer = timer;
        }
    }

    fn on_ack(&mut self, entry: &Arc<ForwardingEntry>, face: FaceId, seq: Seq) {
        let key = RetxKey {
            prefix: *entry.prefix(),
            face,
        };
        let acked = matches!(self.in_flight.get(&key), Some(pending) if seq >= pending.seq);
        if acked {
            if let Some(pending) = self.in_flight.remove(&key) {
                let rtt = pending.first_sent.elapsed();
                self.metrics.iu_acked.increment();
                self.metrics.ack_rtt.observe(rtt.as_micros() as u64);
                debug!(
                    "IU for {} seq {} acked by {} ({:?}, {:?})",
                    key.prefix, seq, face, pending.state, rtt
                );
            }
        } else {
            trace!("Unmatched ack for {} seq {} from {}", key.prefix, seq, face);
        }

        let mut tfib = entry.lock();
        if seq == tfib.seq() && tfib.remove_previous(face) {
            info!("{}: previous hop {} updated", key.prefix, face);
        }
    }

    fn cancel_face(&mut self, face: FaceId) {
        let before = self.in_flight.len();
        self.in_flight.retain(|key, _| key.face != face);
        let cancelled = before - self.in_flight.len();
        if cancelled > 0 {
            self.metrics.iu_cancelled.add(cancelled as u64);
            debug!("Cancelled {} IU(s) towards {}", cancelled, face);
        }
    }

    fn transmit(&self, key: &RetxKey, seq: Seq) {
        let packet = self
            .codec
            .forge_update(&key.prefix, &MapMeParams::update(seq));
        trace!("Sending IU {} seq {} to {}", key.prefix, seq, key.face);
        if let Err(err) = self.transmitter.transmit(key.face, packet) {
            warn!("{}", err);
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn arm(&self, key: RetxKey, generation: u64) -> RetxTimer {
        let deadline = Instant::now() + self.config.retx_period();
        let timers = self.timers.clone();
        RetxTimer(tokio::spawn(async move {
            sleep_until(deadline).await;
            if let Some(tx) = timers.upgrade() {
                let _ = tx.send(Message::Timeout { key, generation }).await;
            }
        }))
    }
}

#[cfg(test)]
mod tests;
