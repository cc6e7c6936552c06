//! `simulate` command: move a producer around a single forwarder
//!
//! The forwarder runs with in-memory faces and FIB. Interest Updates sent by
//! the event manager are delivered to simulated neighbours which, unless
//! told otherwise, answer each one with an acknowledgment.

use anyhow::{ensure, Context, Result};
use bytes::{Bytes, BytesMut};
use log::{debug, info};
use rust_hicn_common::{
    message::MapMeParams,
    types::{FaceId, FaceKind, FaceProto, Seq},
    Prefix,
};
use rust_hicn_mapme::{
    AdjacencyTable, Codec, Faces, Fib, ForwardingEntry, Ingress, MapMe, MapMeConfig, MapMeError,
    TlvCodec, Transmitter,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::utils::{print_header, Timer};

pub struct SimulateArgs {
    pub prefix: String,
    pub faces: usize,
    pub moves: u32,
    /// Neighbours acknowledge the IUs they receive.
    pub ack: bool,
    pub json: bool,
}

/// Hands transmitted packets over to the simulated neighbours.
struct ChannelTransmitter {
    tx: mpsc::UnboundedSender<(FaceId, Bytes)>,
}

impl Transmitter for ChannelTransmitter {
    fn transmit(&self, face: FaceId, packet: Bytes) -> Result<(), MapMeError> {
        self.tx
            .send((face, packet))
            .map_err(|_| MapMeError::Transmit(face, "neighbour gone".into()))
    }
}

pub async fn run(config: MapMeConfig, args: SimulateArgs) -> Result<()> {
    ensure!(args.faces >= 2, "at least two faces are needed to move a producer");
    let prefix: Prefix = args
        .prefix
        .parse()
        .with_context(|| format!("Invalid prefix '{}'", args.prefix))?;
    let _timer = Timer::new("simulate");

    let faces = Arc::new(Faces::new());
    let ids: Vec<FaceId> = (0..args.faces)
        .map(|_| faces.create(FaceKind::Ip, FaceProto::Ip6))
        .collect();
    let adjacencies = Arc::new(AdjacencyTable::new(faces.clone()));
    let fib = Arc::new(Fib::new(
        faces.clone(),
        adjacencies.clone(),
        config.max_nexthops,
    ));
    let entry = fib
        .add_route(prefix, &ids[..1])
        .context("Failed to add route")?;

    // Long enough for a whole retransmission budget to play out.
    let quiet = config.retx_period() * (config.retx_count + 2);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let codec = Arc::new(TlvCodec);
    let (mapme, manager) = MapMe::new(
        config,
        faces,
        fib,
        codec.clone(),
        Arc::new(ChannelTransmitter { tx }),
    );
    let manager = tokio::spawn(manager.run());

    if !args.json {
        print_header(&format!("Moving producer of {}", prefix));
    }
    for step in 1..=args.moves {
        let face = ids[step as usize % ids.len()];
        let packet = codec.forge_update(&prefix, &MapMeParams::update(step as Seq));
        let mut packet = BytesMut::from(&packet[..]);
        let outcome = mapme
            .process_ctrl(&mut packet, Ingress::new(face))
            .context("Interest Update rejected")?;
        if !args.json {
            println!("seq {:<3} from {}: {:?}", step, face, outcome.decision);
        }

        let delivered = exchange(&mapme, codec.as_ref(), &mut rx, args.ack, quiet).await?;
        debug!("Step {}: {} IU(s) delivered", step, delivered);
    }

    let report = report(&mapme, &entry, &adjacencies);
    drop(mapme);
    manager.await.context("Event manager failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_header("Final state");
        println!("{}", serde_json::to_string_pretty(&report["entry"])?);
        print_header("Metrics");
        println!("{}", serde_json::to_string_pretty(&report["metrics"])?);
    }
    info!("Simulation finished");
    Ok(())
}

/// Deliver IUs to the neighbours until none was sent for `quiet`. Returns the number of IUs delivered.
async fn exchange(
    mapme: &MapMe,
    codec: &dyn Codec,
    rx: &mut mpsc::UnboundedReceiver<(FaceId, Bytes)>,
    ack: bool,
    quiet: Duration,
) -> Result<usize> {
    let mut delivered = 0;
    while let Ok(Some((face, packet))) = timeout(quiet, rx.recv()).await {
        delivered += 1;
        let (prefix, params) = codec.decode(&packet)?;
        debug!("{} {} seq {} reached {}", params.kind, prefix, params.seq, face);
        if !ack {
            continue;
        }

        let mut reply = BytesMut::from(&packet[..]);
        codec.forge_ack(&mut reply, &params)?;
        mapme.process_ctrl(&mut reply, Ingress::new(face))?;
        debug!("{} acknowledged seq {}", face, params.seq);
    }
    Ok(delivered)
}

fn report(
    mapme: &MapMe,
    entry: &ForwardingEntry,
    adjacencies: &AdjacencyTable,
) -> serde_json::Value {
    let metrics = mapme.metrics();
    let ids = |faces: Vec<FaceId>| faces.into_iter().map(|face| face.0).collect::<Vec<_>>();

    json!({
        "entry": {
            "prefix": entry.prefix().to_string(),
            "seq": entry.seq(),
            "current": ids(entry.current()),
            "previous": ids(entry.previous()),
            "adjacencies": ids(adjacencies.nexthops(entry.prefix())),
        },
        "metrics": {
            "ctrl_received": metrics.ctrl_received.value(),
            "acks_received": metrics.acks_received.value(),
            "nh_set": metrics.nh_set.value(),
            "nh_add": metrics.nh_add.value(),
            "ph_add": metrics.ph_add.value(),
            "events_enqueued": metrics.events_enqueued.value(),
            "events_dropped": metrics.events_dropped.value(),
            "iu_sent": metrics.iu_sent.value(),
            "iu_retransmitted": metrics.iu_retransmitted.value(),
            "iu_acked": metrics.iu_acked.value(),
            "iu_expired": metrics.iu_expired.value(),
            "iu_cancelled": metrics.iu_cancelled.value(),
            "ack_rtt_avg_us": metrics.ack_rtt.average(),
        },
    })
}
