//! In-memory forwarder used by the unit tests.

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use rust_hicn_common::{
    message::{self, MapMeParams},
    types::{FaceId, FaceKind, FaceProto, Seq},
    Prefix,
};
use std::sync::Arc;

use crate::*;

/// Records every packet instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingTransmitter {
    sent: Mutex<Vec<(FaceId, Bytes)>>,
}

impl RecordingTransmitter {
    /// Decoded IUs in transmission order.
    pub fn sent(&self) -> Vec<(FaceId, Prefix, MapMeParams)> {
        self.sent
            .lock()
            .iter()
            .map(|(face, packet)| {
                let (prefix, params) = message::decode(packet).unwrap();
                (*face, prefix, params)
            })
            .collect()
    }

    pub fn sent_to(&self, face: FaceId) -> Vec<Seq> {
        self.sent()
            .into_iter()
            .filter(|(to, _, _)| *to == face)
            .map(|(_, _, params)| params.seq)
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transmitter for RecordingTransmitter {
    fn transmit(&self, face: FaceId, packet: Bytes) -> Result<(), MapMeError> {
        self.sent.lock().push((face, packet));
        Ok(())
    }
}

pub struct Harness {
    pub faces: Arc<Faces>,
    pub adjacencies: Arc<AdjacencyTable>,
    pub fib: Arc<Fib>,
    pub transmitter: Arc<RecordingTransmitter>,
    pub mapme: MapMe,
    pub manager: Option<EventManager>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(MapMeConfig::default())
    }

    pub fn with_config(config: MapMeConfig) -> Self {
        let faces = Arc::new(Faces::new());
        let adjacencies = Arc::new(AdjacencyTable::new(faces.clone()));
        let fib = Arc::new(Fib::new(
            faces.clone(),
            adjacencies.clone(),
            config.max_nexthops,
        ));
        let transmitter = Arc::new(RecordingTransmitter::default());
        let (mapme, manager) = MapMe::new(
            config,
            faces.clone(),
            fib.clone(),
            Arc::new(TlvCodec),
            transmitter.clone(),
        );
        Self {
            faces,
            adjacencies,
            fib,
            transmitter,
            mapme,
            manager: Some(manager),
        }
    }

    pub fn face(&self) -> FaceId {
        self.faces.create(FaceKind::Ip, FaceProto::Ip6)
    }

    pub fn faces(&self, count: usize) -> Vec<FaceId> {
        (0..count).map(|_| self.face()).collect()
    }

    /// Route `prefix` through `nexthops` with sequence number `seq`.
    pub fn route(&self, prefix: &str, seq: Seq, nexthops: &[FaceId]) -> Arc<ForwardingEntry> {
        let entry = self.fib.add_route(prefix.parse().unwrap(), nexthops).unwrap();
        entry.lock().set_seq(seq);
        entry
    }

    /// Spawn the event manager on the current runtime.
    pub fn spawn_manager(&mut self) {
        let manager = self.manager.take().expect("event manager already spawned");
        tokio::spawn(manager.run());
    }

    pub fn receive(
        &self,
        prefix: &str,
        params: MapMeParams,
        ingress: Ingress,
    ) -> Result<CtrlOutcome, MapMeError> {
        let prefix: Prefix = prefix.parse().unwrap();
        let mut packet = BytesMut::from(&message::encode(&prefix, &params)[..]);
        self.mapme.process_ctrl(&mut packet, ingress)
    }

    pub fn update(&self, prefix: &str, seq: Seq, face: FaceId) -> Result<CtrlOutcome, MapMeError> {
        self.receive(prefix, MapMeParams::update(seq), Ingress::new(face))
    }

    pub fn ack(&self, prefix: &str, seq: Seq, face: FaceId) -> Result<CtrlOutcome, MapMeError> {
        let params = MapMeParams {
            kind: message::MessageType::UpdateAck,
            seq,
        };
        self.receive(prefix, params, Ingress::new(face))
    }
}
