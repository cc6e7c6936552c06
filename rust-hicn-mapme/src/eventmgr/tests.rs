use super::*;
use crate::testutil::Harness;
use rust_hicn_common::types::{FaceKind, FaceProto};
use std::time::Duration;
use tokio::time::sleep;

const PREFIX: &str = "b001::/64";

/// Let the event manager drain its queue.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

/// Long enough for every retransmission to be exhausted.
async fn converge() {
    sleep(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_nh_set_updates_previous_hops_until_expiry() {
    let mut h = Harness::new();
    let (a, b) = (h.face(), h.face());
    h.route(PREFIX, 5, &[a]);
    h.spawn_manager();

    h.update(PREFIX, 6, b).unwrap();
    settle().await;
    assert_eq!(h.transmitter.sent_to(a), vec![6]);
    assert!(h.transmitter.sent_to(b).is_empty());
    assert_eq!(h.mapme.metrics().iu_in_flight.value(), 1);

    converge().await;
    let metrics = h.mapme.metrics();
    assert_eq!(h.transmitter.sent_to(a), vec![6; 4]);
    assert_eq!(metrics.iu_sent.value(), 1);
    assert_eq!(metrics.iu_retransmitted.value(), 3);
    assert_eq!(metrics.iu_expired.value(), 1);
    assert_eq!(metrics.iu_in_flight.value(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ack_stops_retransmission_and_clears_previous_hop() {
    let mut h = Harness::new();
    let (a, b) = (h.face(), h.face());
    let entry = h.route(PREFIX, 5, &[a]);
    h.spawn_manager();

    h.update(PREFIX, 6, b).unwrap();
    settle().await;
    assert_eq!(entry.previous(), vec![a]);

    h.ack(PREFIX, 6, a).unwrap();
    settle().await;
    assert!(entry.previous().is_empty());
    assert_eq!(h.faces.locks(a), Some(1));

    converge().await;
    let metrics = h.mapme.metrics();
    assert_eq!(h.transmitter.sent_to(a), vec![6]);
    assert_eq!(metrics.iu_acked.value(), 1);
    assert_eq!(metrics.ack_rtt.count(), 1);
    assert_eq!(metrics.iu_expired.value(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_outdated_ack_keeps_previous_hop() {
    let mut h = Harness::new();
    let (a, b) = (h.face(), h.face());
    let entry = h.route(PREFIX, 5, &[a]);
    h.spawn_manager();

    h.update(PREFIX, 6, b).unwrap();
    settle().await;
    h.ack(PREFIX, 5, a).unwrap();
    settle().await;

    assert_eq!(entry.previous(), vec![a]);
    assert_eq!(h.mapme.metrics().iu_acked.value(), 0);
    assert_eq!(h.mapme.metrics().iu_in_flight.value(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_face_deletion_cancels_retransmission() {
    let mut h = Harness::new();
    let (a, b) = (h.face(), h.face());
    h.route(PREFIX, 5, &[a]);
    h.spawn_manager();

    h.update(PREFIX, 6, b).unwrap();
    settle().await;
    h.mapme.face_deleted(a, FaceKind::Ip).unwrap();

    converge().await;
    assert_eq!(h.transmitter.sent_to(a), vec![6]);
    assert_eq!(h.mapme.metrics().iu_cancelled.value(), 1);
    assert_eq!(h.mapme.metrics().iu_in_flight.value(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_face_is_not_retransmitted_to() {
    let mut h = Harness::new();
    let (a, b) = (h.face(), h.face());
    h.route(PREFIX, 5, &[a]);
    h.spawn_manager();

    h.update(PREFIX, 6, b).unwrap();
    settle().await;
    h.faces.remove(a);

    converge().await;
    assert_eq!(h.transmitter.sent_to(a), vec![6]);
    assert_eq!(h.mapme.metrics().iu_cancelled.value(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_promoted_previous_hop_is_no_longer_updated() {
    let mut h = Harness::new();
    let (a, b) = (h.face(), h.face());
    let entry = h.route(PREFIX, 5, &[a]);
    h.spawn_manager();

    h.update(PREFIX, 6, b).unwrap();
    settle().await;
    // a learnt about the move through another path.
    h.update(PREFIX, 6, a).unwrap();
    assert_eq!(entry.current(), vec![b, a]);

    converge().await;
    assert_eq!(h.transmitter.sent_to(a), vec![6]);
    assert!(h.transmitter.sent_to(b).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ph_add_updates_stale_face() {
    let mut h = Harness::new();
    let (a, b) = (h.face(), h.face());
    h.route(PREFIX, 6, &[b]);
    h.spawn_manager();

    h.update(PREFIX, 5, a).unwrap();
    settle().await;
    assert_eq!(h.transmitter.sent_to(a), vec![6]);
    assert!(h.transmitter.sent_to(b).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_nh_add_does_not_reflect_to_current_next_hops() {
    let mut h = Harness::new();
    let (a, b, c) = (h.face(), h.face(), h.face());
    let entry = h.route(PREFIX, 6, &[b]);
    entry.lock().add_previous(a).unwrap();
    h.spawn_manager();

    h.update(PREFIX, 6, c).unwrap();
    settle().await;
    assert_eq!(h.transmitter.sent_to(a), vec![6]);
    assert!(h.transmitter.sent_to(b).is_empty());
    assert!(h.transmitter.sent_to(c).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_newer_update_replaces_in_flight_one() {
    let mut h = Harness::new();
    let (a, b, c) = (h.face(), h.face(), h.face());
    h.route(PREFIX, 5, &[a]);
    h.spawn_manager();

    h.update(PREFIX, 6, b).unwrap();
    settle().await;
    h.update(PREFIX, 7, c).unwrap();
    settle().await;
    assert_eq!(h.transmitter.sent_to(a), vec![6, 7]);
    assert_eq!(h.transmitter.sent_to(b), vec![7]);
    assert_eq!(h.mapme.metrics().iu_in_flight.value(), 2);

    converge().await;
    // Retransmissions only ever carry the latest sequence number.
    assert_eq!(h.transmitter.sent_to(a), vec![6, 7, 7, 7, 7]);
    assert_eq!(h.mapme.metrics().iu_expired.value(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_send_update_reannounces_prefixes() {
    let mut h = Harness::new();
    let (a, b) = (h.face(), h.face());
    h.route(PREFIX, 5, &[a]);
    h.route("b002::/64", 1, &[a]);
    h.spawn_manager();

    h.update(PREFIX, 6, b).unwrap();
    settle().await;
    // Already in flight with the same sequence number.
    assert_eq!(h.mapme.send_update(b), 1);
    settle().await;
    assert_eq!(h.transmitter.sent_to(a), vec![6]);

    converge().await;
    h.transmitter.clear();
    assert_eq!(h.mapme.send_update(b), 1);
    settle().await;
    assert_eq!(h.transmitter.sent_to(a), vec![6]);
}

#[tokio::test(start_paused = true)]
async fn test_announce_producer() {
    let mut h = Harness::new();
    let a = h.face();
    let app = h.faces.create(FaceKind::App, FaceProto::Ip6);
    let entry = h.route(PREFIX, 3, &[a]);
    h.spawn_manager();

    let prefix = PREFIX.parse().unwrap();
    assert_eq!(h.mapme.announce_producer(&prefix, app).unwrap(), 4);
    assert_eq!(entry.current(), vec![app]);
    assert_eq!(entry.previous(), vec![a]);

    settle().await;
    assert_eq!(h.transmitter.sent_to(a), vec![4]);
    assert!(h.transmitter.sent_to(app).is_empty());

    h.faces.remove(app);
    assert_eq!(
        h.mapme.announce_producer(&prefix, app),
        Err(MapMeError::FaceInvalid(app))
    );
}

#[test]
fn test_announce_skips_invalid_seq_on_wrap() {
    let h = Harness::new();
    let app = h.face();
    let entry = h.route(PREFIX, u32::MAX, &[]);

    let prefix = PREFIX.parse().unwrap();
    assert_eq!(h.mapme.announce_producer(&prefix, app).unwrap(), 1);
    assert_eq!(entry.seq(), 1);
}

#[test]
fn test_full_queue_drops_newest_event() {
    let config = MapMeConfig {
        event_queue_size: 1,
        ..MapMeConfig::default()
    };
    let mut h = Harness::with_config(config);
    let (a, b) = (h.face(), h.face());

    h.mapme.face_added(a).unwrap();
    assert_eq!(h.mapme.face_added(b), Err(MapMeError::QueueFull));
    assert_eq!(h.mapme.metrics().events_dropped.value(), 1);

    let manager = h.manager.as_mut().unwrap();
    assert!(matches!(manager.try_next_event(), Some(Event::FaceAdd(face)) if face == a));
    assert!(manager.try_next_event().is_none());
}

#[tokio::test]
async fn test_manager_stops_with_its_senders() {
    let Harness { mapme, manager, .. } = Harness::new();
    let handle = tokio::spawn(manager.unwrap().run());

    drop(mapme);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_closed_queue() {
    let Harness { mapme, manager, .. } = Harness::new();
    drop(manager);

    assert_eq!(mapme.face_added(FaceId(1)), Err(MapMeError::Closed));
}
