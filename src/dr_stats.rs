// Simulation Statistics

use hashbrown::HashSet;
use serde::Serialize;

use crate::dr_baseline::BaselineResult;
use crate::dr_interface::{EventId, MessageKind, SimTime, Uplink};
use crate::dr_topology::TopologySummary;

/// Outcomes of the P2P verification protocol, as seen by the requesting node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Started,
    Confirmed,
    TimedOut,
    Suppressed,
    StaleResponse,
}

// ============================================================================
// Collector
// ============================================================================

/// Accumulates counters and latency samples during a run.
///
/// Only the first uplink for a given event counts toward true/false positives
/// and latencies; later reports of the same event by other nodes are tallied
/// in `total_detections` alone. This keeps
/// `true_positives + false_positives == latencies.len()`.
#[derive(Debug, Clone, Default)]
pub struct StatsCollector {
    total_events: u64,
    intruder_events: u64,
    noise_events: u64,
    true_positives: u64,
    false_positives: u64,
    latencies: Vec<SimTime>,
    reported: HashSet<EventId>,
    total_detections: u64,
    detections_during_outage: u64,
    tier1_uplinks: u64,
    p2p_uplinks: u64,
    verify_requests_sent: u64,
    verify_responses_sent: u64,
    messages_lost: u64,
    verifications_started: u64,
    verifications_confirmed: u64,
    verifications_timed_out: u64,
    verifications_suppressed: u64,
    stale_responses: u64,
}

/// Derived rates and latency figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub detection_rate: f64,
    pub false_positive_rate: f64,
    pub mean_latency_seconds: f64,
    pub max_latency_seconds: f64,
    pub p95_latency_seconds: f64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&mut self, is_intruder: bool) {
        self.total_events += 1;
        if is_intruder {
            self.intruder_events += 1;
        } else {
            self.noise_events += 1;
        }
    }

    /// Count one transmission, lost or not
    pub fn record_p2p_message(&mut self, kind: MessageKind) {
        match kind {
            MessageKind::VerifyRequest => self.verify_requests_sent += 1,
            MessageKind::VerifyResponse => self.verify_responses_sent += 1,
        }
    }

    pub fn record_message_lost(&mut self) {
        self.messages_lost += 1;
    }

    pub fn record_verification(&mut self, outcome: VerificationOutcome) {
        match outcome {
            VerificationOutcome::Started => self.verifications_started += 1,
            VerificationOutcome::Confirmed => self.verifications_confirmed += 1,
            VerificationOutcome::TimedOut => self.verifications_timed_out += 1,
            VerificationOutcome::Suppressed => self.verifications_suppressed += 1,
            VerificationOutcome::StaleResponse => self.stale_responses += 1,
        }
    }

    /// Record an uplink. Returns `true` if this is the first report of its event.
    pub fn record_uplink(&mut self, uplink: &Uplink, gateway_up: bool) -> bool {
        self.total_detections += 1;
        if uplink.p2p_used {
            self.p2p_uplinks += 1;
        } else {
            self.tier1_uplinks += 1;
        }

        if !self.reported.insert(uplink.event_id) {
            return false;
        }
        if uplink.is_intruder {
            self.true_positives += 1;
        } else {
            self.false_positives += 1;
        }
        self.latencies.push(uplink.latency);
        if !gateway_up {
            self.detections_during_outage += 1;
        }
        true
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    pub fn intruder_events(&self) -> u64 {
        self.intruder_events
    }

    pub fn noise_events(&self) -> u64 {
        self.noise_events
    }

    pub fn true_positives(&self) -> u64 {
        self.true_positives
    }

    pub fn false_positives(&self) -> u64 {
        self.false_positives
    }

    pub fn latencies(&self) -> &[SimTime] {
        &self.latencies
    }

    pub fn p2p_messages_sent(&self) -> u64 {
        self.verify_requests_sent + self.verify_responses_sent
    }

    pub fn protocol(&self) -> ProtocolCounters {
        ProtocolCounters {
            verify_requests_sent: self.verify_requests_sent,
            verify_responses_sent: self.verify_responses_sent,
            messages_lost: self.messages_lost,
            tier1_uplinks: self.tier1_uplinks,
            p2p_uplinks: self.p2p_uplinks,
            verifications_started: self.verifications_started,
            verifications_confirmed: self.verifications_confirmed,
            verifications_timed_out: self.verifications_timed_out,
            verifications_suppressed: self.verifications_suppressed,
            stale_responses: self.stale_responses,
        }
    }

    pub fn finalize(&self) -> Metrics {
        Metrics {
            detection_rate: ratio(self.true_positives, self.intruder_events),
            false_positive_rate: ratio(self.false_positives, self.noise_events),
            mean_latency_seconds: mean(&self.latencies),
            max_latency_seconds: self.latencies.iter().copied().fold(0.0, f64::max),
            p95_latency_seconds: percentile(&self.latencies, 95.0),
        }
    }

    pub fn gateway_report(&self, enabled: bool) -> GatewayReport {
        GatewayReport {
            enabled,
            detections_during_outage: self.detections_during_outage,
            outage_detection_rate: ratio(
                self.detections_during_outage,
                self.latencies.len() as u64,
            ),
        }
    }

    pub fn total_detections(&self) -> u64 {
        self.total_detections
    }

    pub fn unique_detections(&self) -> u64 {
        self.latencies.len() as u64
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Linear-interpolated percentile (`pct` in 0..=100); 0 for an empty sample
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

// ============================================================================
// Result Record
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProtocolCounters {
    pub verify_requests_sent: u64,
    pub verify_responses_sent: u64,
    pub messages_lost: u64,
    pub tier1_uplinks: u64,
    pub p2p_uplinks: u64,
    pub verifications_started: u64,
    pub verifications_confirmed: u64,
    pub verifications_timed_out: u64,
    pub verifications_suppressed: u64,
    pub stale_responses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GatewayReport {
    pub enabled: bool,
    pub detections_during_outage: u64,
    pub outage_detection_rate: f64,
}

/// Everything a run hands to the reporting layer. Field names of the first
/// block are the compatibility contract with that layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub total_events: u64,
    pub intruder_events: u64,
    pub noise_events: u64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub p2p_messages_sent: u64,
    pub latencies: Vec<SimTime>,
    pub detection_rate: f64,
    pub false_positive_rate: f64,
    pub mean_latency_seconds: f64,

    pub max_latency_seconds: f64,
    pub p95_latency_seconds: f64,
    pub total_detections: u64,
    pub unique_detections: u64,
    pub protocol: ProtocolCounters,
    pub gateway: GatewayReport,
    pub baseline: BaselineResult,
    pub topology: TopologySummary,

    pub run_id: Option<String>,
    pub seed: u64,
    pub sim_duration_seconds: SimTime,
}

impl SimulationResult {
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// blake3 digest of the serialized record; equal digests mean
    /// byte-identical results
    pub fn fingerprint(&self) -> Result<blake3::Hash, serde_yaml::Error> {
        Ok(blake3::hash(self.to_yaml()?.as_bytes()))
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║    DUAL-RING PERIMETER SIMULATION RESULTS              ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        if let Some(ref id) = self.run_id {
            println!("Run: {}", id);
        }
        println!("Seed: {}", self.seed);
        println!(
            "Topology: {} nodes ({} outer, {} inner), degree min={} max={} avg={:.1}",
            self.topology.total_nodes,
            self.topology.outer_nodes,
            self.topology.inner_nodes,
            self.topology.min_degree,
            self.topology.max_degree,
            self.topology.avg_degree
        );
        println!("Virtual time: {:.1}s", self.sim_duration_seconds);
        println!();

        println!("═══ Events ═══");
        println!(
            "  Total: {} ({} intruder, {} noise)",
            self.total_events, self.intruder_events, self.noise_events
        );
        println!(
            "  Detections: {} unique, {} total",
            self.unique_detections, self.total_detections
        );
        println!();

        println!("═══ Detection Performance ═══");
        println!(
            "  Detection Rate: {:.2}% ({} TP)",
            self.detection_rate * 100.0,
            self.true_positives
        );
        println!(
            "  False Positive Rate: {:.2}% ({} FP)",
            self.false_positive_rate * 100.0,
            self.false_positives
        );
        println!(
            "  Latency: mean={:.3}s p95={:.3}s max={:.3}s",
            self.mean_latency_seconds, self.p95_latency_seconds, self.max_latency_seconds
        );
        println!();

        let p = &self.protocol;
        println!("═══ P2P Verification ═══");
        println!(
            "  Messages: {} ({} requests, {} responses, {} lost)",
            self.p2p_messages_sent, p.verify_requests_sent, p.verify_responses_sent, p.messages_lost
        );
        println!(
            "  Verifications: {} started, {} confirmed, {} timed out, {} suppressed",
            p.verifications_started,
            p.verifications_confirmed,
            p.verifications_timed_out,
            p.verifications_suppressed
        );
        println!(
            "  Uplinks: {} tier-1, {} P2P-confirmed",
            p.tier1_uplinks, p.p2p_uplinks
        );
        println!();

        if self.gateway.enabled {
            println!("═══ Gateway ═══");
            println!(
                "  Detections during outage: {} ({:.1}%)",
                self.gateway.detections_during_outage,
                self.gateway.outage_detection_rate * 100.0
            );
            println!();
        }

        println!("═══ PIR-only Baseline ═══");
        println!(
            "  Detection Rate: {:.2}%  False Positive Rate: {:.2}%  ({} detections)",
            self.baseline.detection_rate * 100.0,
            self.baseline.false_positive_rate * 100.0,
            self.baseline.total_detections
        );
        println!(
            "  FPR reduction vs baseline: {:.2} pts",
            (self.baseline.false_positive_rate - self.false_positive_rate) * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uplink(event_id: EventId, is_intruder: bool, latency: f64, p2p_used: bool) -> Uplink {
        Uplink {
            event_id,
            node: 0,
            is_intruder,
            latency,
            p2p_used,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_event_counters_conserve() {
        let mut stats = StatsCollector::new();
        for i in 0..10 {
            stats.record_event(i % 3 == 0);
        }
        assert_eq!(stats.total_events(), 10);
        assert_eq!(stats.intruder_events(), 4);
        assert_eq!(stats.noise_events(), 6);
    }

    #[test]
    fn test_uplinks_classified_by_ground_truth() {
        let mut stats = StatsCollector::new();
        assert!(stats.record_uplink(&uplink(1, true, 0.1, false), true));
        assert!(stats.record_uplink(&uplink(2, false, 0.4, true), true));

        assert_eq!(stats.true_positives(), 1);
        assert_eq!(stats.false_positives(), 1);
        assert_eq!(stats.latencies(), &[0.1, 0.4]);
        let protocol = stats.protocol();
        assert_eq!(protocol.tier1_uplinks, 1);
        assert_eq!(protocol.p2p_uplinks, 1);
    }

    #[test]
    fn test_duplicate_reports_count_once() {
        let mut stats = StatsCollector::new();
        assert!(stats.record_uplink(&uplink(5, true, 0.05, false), true));
        assert!(!stats.record_uplink(&uplink(5, true, 0.06, false), true));
        assert!(!stats.record_uplink(&uplink(5, true, 0.50, true), true));

        assert_eq!(stats.true_positives(), 1);
        assert_eq!(stats.latencies().len(), 1);
        assert_eq!(stats.total_detections(), 3);
        assert_eq!(stats.unique_detections(), 1);
        assert_eq!(
            stats.true_positives() + stats.false_positives(),
            stats.latencies().len() as u64
        );
    }

    #[test]
    fn test_finalize_rates() {
        let mut stats = StatsCollector::new();
        for _ in 0..4 {
            stats.record_event(true);
        }
        for _ in 0..10 {
            stats.record_event(false);
        }
        stats.record_uplink(&uplink(0, true, 1.0, false), true);
        stats.record_uplink(&uplink(1, true, 2.0, false), true);
        stats.record_uplink(&uplink(2, true, 3.0, true), true);
        stats.record_uplink(&uplink(3, false, 4.0, true), true);

        let metrics = stats.finalize();
        assert_eq!(metrics.detection_rate, 0.75);
        assert_eq!(metrics.false_positive_rate, 0.1);
        assert_eq!(metrics.mean_latency_seconds, 2.5);
        assert_eq!(metrics.max_latency_seconds, 4.0);
    }

    #[test]
    fn test_finalize_with_empty_denominators() {
        let stats = StatsCollector::new();
        let metrics = stats.finalize();
        assert_eq!(metrics.detection_rate, 0.0);
        assert_eq!(metrics.false_positive_rate, 0.0);
        assert_eq!(metrics.mean_latency_seconds, 0.0);
        assert_eq!(metrics.p95_latency_seconds, 0.0);
    }

    #[test]
    fn test_p2p_message_counts() {
        let mut stats = StatsCollector::new();
        stats.record_p2p_message(MessageKind::VerifyRequest);
        stats.record_p2p_message(MessageKind::VerifyRequest);
        stats.record_p2p_message(MessageKind::VerifyResponse);
        stats.record_message_lost();
        assert_eq!(stats.p2p_messages_sent(), 3);
        assert_eq!(stats.protocol().messages_lost, 1);
    }

    #[test]
    fn test_outage_detections() {
        let mut stats = StatsCollector::new();
        stats.record_uplink(&uplink(0, true, 1.0, false), false);
        stats.record_uplink(&uplink(1, true, 1.0, false), true);
        // duplicate during outage is not a new detection
        stats.record_uplink(&uplink(1, true, 1.0, false), false);

        let report = stats.gateway_report(true);
        assert_eq!(report.detections_during_outage, 1);
        assert_eq!(report.outage_detection_rate, 0.5);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values: Vec<f64> = (1..=11).map(|v| v as f64).collect();
        assert_eq!(percentile(&values, 50.0), 6.0);
        assert_eq!(percentile(&values, 100.0), 11.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert!((percentile(&values, 95.0) - 10.5).abs() < 1e-12);
        assert_eq!(percentile(&[3.0], 95.0), 3.0);
    }
}
