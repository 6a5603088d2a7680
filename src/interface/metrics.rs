//! Signaling and peer lifecycle metrics
//!
//! Recorded through the `metrics` facade; installing an exporter is up to
//! the embedding application.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    describe_counter!(
        "signaling_messages_received_total",
        "Total number of decoded signaling messages received from the relay"
    );
    describe_counter!(
        "signaling_messages_dropped_total",
        "Total number of malformed signaling messages dropped"
    );
    describe_counter!(
        "signaling_messages_sent_total",
        "Total number of signaling messages written to the relay"
    );
    describe_counter!(
        "peer_negotiations_failed_total",
        "Total number of peer negotiations that failed"
    );
    describe_counter!(
        "peer_offer_collisions_total",
        "Total number of simultaneous offers resolved by tie-break"
    );
    describe_counter!(
        "peer_media_ready_total",
        "Total number of peers whose remote media became ready"
    );
    describe_histogram!(
        "peer_negotiation_duration_seconds",
        "Time from controller creation to media-ready"
    );
    describe_gauge!("peers_active", "Number of registered peer controllers");
}

/// Record a decoded inbound message
pub fn record_received(kind: &'static str) {
    counter!("signaling_messages_received_total", "type" => kind).increment(1);
}

/// Record a dropped inbound message
pub fn record_dropped() {
    counter!("signaling_messages_dropped_total").increment(1);
}

/// Record an outbound relay write
pub fn record_sent(kind: &'static str) {
    counter!("signaling_messages_sent_total", "type" => kind).increment(1);
}

pub fn record_negotiation_failed() {
    counter!("peer_negotiations_failed_total").increment(1);
}

pub fn record_offer_collision() {
    counter!("peer_offer_collisions_total").increment(1);
}

pub fn record_media_ready(elapsed: Duration) {
    counter!("peer_media_ready_total").increment(1);
    histogram!("peer_negotiation_duration_seconds").record(elapsed.as_secs_f64());
}

/// Update active peers gauge
pub fn update_active_peers(count: usize) {
    gauge!("peers_active").set(count as f64);
}
