//! Perimeter node
//!
//! Each node evaluates every stimulus its sensor picks up and places the
//! classifier confidence in one of three tiers. High confidence is reported
//! straight away. Borderline confidence opens a verification round: the node
//! asks every P2P neighbour to take its own look, reports on the first
//! corroboration, and gives up silently when the timeout fires first.

use std::mem;

use log::debug;

use crate::dr_context::{Action, Schedulable, SimContext};
use crate::dr_interface::{Event, EventId, NodeId, P2pMessage, SensorEvent, SimTime, Tier, Uplink};
use crate::dr_scheduler::EventHandle;
use crate::dr_stats::VerificationOutcome;

/// Context of an open verification round. Carries the whole stimulus so the
/// confirmation path can complete an uplink without looking anything up.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationState {
    pub event: SensorEvent,
    pub confidence: f64,
    pub confirmations: u32,
    pub timeout: EventHandle,
    pub started_at: SimTime,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeState {
    #[default]
    Idle,
    AwaitingVerification(VerificationState),
}

pub struct PerimeterNode {
    id: NodeId,
    state: NodeState,
}

impl PerimeterNode {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            state: NodeState::Idle,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, NodeState::Idle)
    }

    /// Event id of the open verification round, if any
    pub fn pending_event(&self) -> Option<EventId> {
        match &self.state {
            NodeState::AwaitingVerification(v) => Some(v.event.id),
            NodeState::Idle => None,
        }
    }

    fn on_sensor_trigger(&mut self, event: SensorEvent, ctx: &mut SimContext<'_>) {
        let confidence = ctx.draw_confidence(event.is_intruder);
        let tier = ctx.config.decision_logic.classify(confidence);
        ctx.emit(
            Some(self.id),
            Event::TriggerEvaluated {
                event_id: event.id,
                confidence,
                tier,
            },
        );

        match tier {
            Tier::Confirm => self.send_uplink(&event, confidence, false, ctx),
            Tier::Verify => self.begin_verification(event, confidence, ctx),
            Tier::Ignore => {}
        }
    }

    fn begin_verification(&mut self, event: SensorEvent, confidence: f64, ctx: &mut SimContext<'_>) {
        if let NodeState::AwaitingVerification(pending) = &self.state {
            debug!(
                "node {} busy with event {}, suppressing event {}",
                self.id, pending.event.id, event.id
            );
            ctx.stats.record_verification(VerificationOutcome::Suppressed);
            ctx.emit(
                Some(self.id),
                Event::VerificationSuppressed {
                    event_id: event.id,
                    pending: pending.event.id,
                },
            );
            return;
        }

        ctx.stats.record_verification(VerificationOutcome::Started);
        let topology = ctx.topology;
        for neighbor in topology.neighbors(self.id) {
            ctx.send_p2p(
                self.id,
                neighbor,
                P2pMessage::VerifyRequest {
                    from: self.id,
                    event,
                },
            );
        }

        let timeout = ctx.schedule(
            ctx.config.decision_logic.verification_timeout,
            Action::VerificationTimeout {
                node: self.id,
                event_id: event.id,
            },
        );
        self.state = NodeState::AwaitingVerification(VerificationState {
            event,
            confidence,
            confirmations: 0,
            timeout,
            started_at: ctx.now(),
        });
    }

    /// A neighbour asks for a second opinion on `event`
    fn on_verify_request(&mut self, from: NodeId, event: SensorEvent, ctx: &mut SimContext<'_>) {
        let confidence = ctx.draw_confidence(event.is_intruder);
        if confidence >= ctx.config.decision_logic.confirm_threshold {
            ctx.send_p2p(
                self.id,
                from,
                P2pMessage::VerifyResponse {
                    from: self.id,
                    event_id: event.id,
                },
            );
        }
    }

    fn on_verify_response(&mut self, from: NodeId, event_id: EventId, ctx: &mut SimContext<'_>) {
        let matches = self.pending_event() == Some(event_id);
        if !matches {
            ctx.stats.record_verification(VerificationOutcome::StaleResponse);
            ctx.emit(Some(self.id), Event::StaleResponse { event_id, from });
            return;
        }

        let NodeState::AwaitingVerification(mut verification) =
            mem::replace(&mut self.state, NodeState::Idle)
        else {
            return;
        };
        verification.confirmations += 1;
        ctx.cancel(verification.timeout);
        ctx.stats.record_verification(VerificationOutcome::Confirmed);
        ctx.emit(Some(self.id), Event::VerificationConfirmed { event_id, by: from });
        self.send_uplink(&verification.event, verification.confidence, true, ctx);
    }

    fn on_timeout(&mut self, event_id: EventId, ctx: &mut SimContext<'_>) {
        if self.pending_event() != Some(event_id) {
            return;
        }
        self.state = NodeState::Idle;
        ctx.stats.record_verification(VerificationOutcome::TimedOut);
        ctx.emit(Some(self.id), Event::VerificationTimedOut { event_id });
    }

    fn send_uplink(
        &self,
        event: &SensorEvent,
        confidence: f64,
        p2p_used: bool,
        ctx: &mut SimContext<'_>,
    ) {
        let uplink = Uplink {
            event_id: event.id,
            node: self.id,
            is_intruder: event.is_intruder,
            latency: ctx.now() - event.time_emitted,
            p2p_used,
            confidence,
        };
        let first_report = ctx.stats.record_uplink(&uplink, ctx.gateway_up);
        ctx.emit(
            Some(self.id),
            Event::Uplink {
                event_id: event.id,
                p2p_used,
                latency: uplink.latency,
                first_report,
            },
        );
    }
}

impl Schedulable for PerimeterNode {
    fn handle(&mut self, action: Action, ctx: &mut SimContext<'_>) {
        match action {
            Action::SensorTrigger { event, .. } => self.on_sensor_trigger(event, ctx),
            Action::Deliver { message, .. } => match message {
                P2pMessage::VerifyRequest { from, event } => self.on_verify_request(from, event, ctx),
                P2pMessage::VerifyResponse { from, event_id } => {
                    self.on_verify_response(from, event_id, ctx)
                }
            },
            Action::VerificationTimeout { event_id, .. } => self.on_timeout(event_id, ctx),
            Action::Generate | Action::GatewayToggle | Action::Shutdown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dr_config::{ImageModelConfig, SimConfig};
    use crate::dr_context::Target;
    use crate::dr_interface::{Position, RecordingSink};
    use crate::dr_random::RandomStream;
    use crate::dr_scheduler::Scheduler;
    use crate::dr_stats::StatsCollector;
    use crate::dr_topology::Topology;

    struct Harness {
        config: SimConfig,
        topology: Topology,
        scheduler: Scheduler<Action>,
        rng: RandomStream,
        stats: StatsCollector,
        sink: RecordingSink,
        nodes: Vec<PerimeterNode>,
    }

    impl Harness {
        /// Deterministic confidences: every draw returns the label's mean
        fn new(intruder_mean: f64, p2p_range: f64) -> Self {
            let mut config = SimConfig::default();
            config.topology.p2p_range = p2p_range;
            config.communication.delay_jitter = 0.0;
            config.image_model = ImageModelConfig {
                intruder_mean,
                intruder_std: 0.0,
                noise_mean: 0.1,
                noise_std: 0.0,
            };
            let topology = Topology::build(&config.topology);
            let nodes = (0..topology.len()).map(PerimeterNode::new).collect();
            Self {
                topology,
                rng: RandomStream::new(7),
                config,
                scheduler: Scheduler::new(),
                stats: StatsCollector::new(),
                sink: RecordingSink::default(),
                nodes,
            }
        }

        fn deliver(&mut self, action: Action) {
            let Target::Node(id) = action.target() else {
                return;
            };
            let mut ctx = SimContext {
                scheduler: &mut self.scheduler,
                rng: &mut self.rng,
                stats: &mut self.stats,
                sink: &mut self.sink,
                config: &self.config,
                topology: &self.topology,
                gateway_up: true,
            };
            self.nodes[id].handle(action, &mut ctx);
        }

        fn step(&mut self) {
            if let Some(action) = self.scheduler.pop_due(f64::INFINITY) {
                self.deliver(action);
            }
        }

        fn run(&mut self) {
            while let Some(action) = self.scheduler.pop_due(f64::INFINITY) {
                self.deliver(action);
            }
        }

        fn trigger(&mut self, node: NodeId, event: SensorEvent) {
            self.scheduler
                .schedule(0.05, Action::SensorTrigger { node, event });
        }
    }

    fn intruder(id: EventId) -> SensorEvent {
        SensorEvent {
            id,
            origin: Position::default(),
            is_intruder: true,
            time_emitted: 0.0,
        }
    }

    #[test]
    fn test_tier_one_uplinks_immediately() {
        let mut h = Harness::new(0.9, 30.0);
        h.trigger(0, intruder(1));
        h.run();

        assert_eq!(h.stats.true_positives(), 1);
        assert_eq!(h.stats.latencies(), &[0.05]);
        assert_eq!(h.stats.p2p_messages_sent(), 0);
        assert_eq!(h.stats.protocol().tier1_uplinks, 1);
        assert!(h.nodes[0].is_idle());
    }

    #[test]
    fn test_low_confidence_is_dropped() {
        let mut h = Harness::new(0.9, 30.0);
        let noise = SensorEvent {
            is_intruder: false,
            ..intruder(1)
        };
        h.trigger(0, noise);
        h.run();

        assert_eq!(h.stats.total_detections(), 0);
        assert_eq!(h.stats.protocol().verifications_started, 0);
        assert!(matches!(
            h.sink.events[0].2,
            Event::TriggerEvaluated {
                tier: Tier::Ignore,
                ..
            }
        ));
    }

    #[test]
    fn test_tier_two_broadcasts_and_times_out() {
        // 0.75 sits in the verify band and is below the confirm threshold,
        // so no neighbour ever answers
        let mut h = Harness::new(0.75, 30.0);
        h.trigger(0, intruder(1));
        h.step();

        let degree = h.topology.degree(0) as u64;
        assert!(degree > 0);
        assert_eq!(h.nodes[0].pending_event(), Some(1));
        assert_eq!(h.stats.protocol().verify_requests_sent, degree);

        h.run();
        assert!(h.nodes[0].is_idle());
        let protocol = h.stats.protocol();
        assert_eq!(protocol.verify_responses_sent, 0);
        assert_eq!(protocol.verifications_timed_out, 1);
        assert_eq!(h.stats.total_detections(), 0);
        assert!((h.scheduler.now() - 3.05).abs() < 1e-9);
    }

    #[test]
    fn test_isolated_node_never_uplinks() {
        let mut h = Harness::new(0.75, 1.0);
        h.trigger(3, intruder(1));
        h.run();

        assert_eq!(h.stats.p2p_messages_sent(), 0);
        assert_eq!(h.stats.protocol().verifications_timed_out, 1);
        assert_eq!(h.stats.total_detections(), 0);
        assert!(h.nodes[3].is_idle());
    }

    #[test]
    fn test_neighbour_answers_confident_request() {
        let mut h = Harness::new(0.9, 30.0);
        h.deliver(Action::Deliver {
            to: 1,
            message: P2pMessage::VerifyRequest {
                from: 0,
                event: intruder(4),
            },
        });

        assert_eq!(h.stats.protocol().verify_responses_sent, 1);
        assert_eq!(
            h.scheduler.pop_due(f64::INFINITY),
            Some(Action::Deliver {
                to: 0,
                message: P2pMessage::VerifyResponse {
                    from: 1,
                    event_id: 4
                }
            })
        );
    }

    #[test]
    fn test_first_confirmation_uplinks_and_cancels_timeout() {
        let mut h = Harness::new(0.75, 30.0);
        h.trigger(0, intruder(2));
        h.step();
        let NodeState::AwaitingVerification(verification) = h.nodes[0].state().clone() else {
            panic!("node should be awaiting verification");
        };

        let response = |from| Action::Deliver {
            to: 0,
            message: P2pMessage::VerifyResponse { from, event_id: 2 },
        };
        h.deliver(response(1));

        assert!(h.nodes[0].is_idle());
        assert!(!h.scheduler.is_pending(verification.timeout));
        assert_eq!(h.stats.protocol().p2p_uplinks, 1);
        assert_eq!(h.stats.true_positives(), 1);

        // a second confirmation for the same round is stale
        h.deliver(response(7));
        assert_eq!(h.stats.protocol().stale_responses, 1);
        assert_eq!(h.stats.total_detections(), 1);

        h.run();
        let protocol = h.stats.protocol();
        assert_eq!(protocol.verifications_confirmed, 1);
        assert_eq!(protocol.verifications_timed_out, 0);
        assert_eq!(h.scheduler.skipped(), 1);
    }

    #[test]
    fn test_response_while_idle_is_ignored() {
        let mut h = Harness::new(0.75, 30.0);
        h.deliver(Action::Deliver {
            to: 5,
            message: P2pMessage::VerifyResponse {
                from: 4,
                event_id: 9,
            },
        });
        assert!(h.nodes[5].is_idle());
        assert_eq!(h.stats.protocol().stale_responses, 1);
        assert_eq!(h.stats.total_detections(), 0);
    }

    #[test]
    fn test_mismatched_response_leaves_round_open() {
        let mut h = Harness::new(0.75, 30.0);
        h.trigger(0, intruder(2));
        h.step();

        h.deliver(Action::Deliver {
            to: 0,
            message: P2pMessage::VerifyResponse {
                from: 1,
                event_id: 99,
            },
        });
        assert_eq!(h.nodes[0].pending_event(), Some(2));
        assert_eq!(h.stats.protocol().stale_responses, 1);
    }

    #[test]
    fn test_second_borderline_reading_is_suppressed() {
        let mut h = Harness::new(0.75, 30.0);
        h.trigger(0, intruder(1));
        h.trigger(0, intruder(2));
        h.step();
        h.step();

        assert_eq!(h.nodes[0].pending_event(), Some(1));
        let protocol = h.stats.protocol();
        assert_eq!(protocol.verifications_started, 1);
        assert_eq!(protocol.verifications_suppressed, 1);
    }

    #[test]
    fn test_stale_timeout_is_ignored() {
        let mut h = Harness::new(0.75, 30.0);
        h.deliver(Action::VerificationTimeout {
            node: 2,
            event_id: 5,
        });
        assert!(h.nodes[2].is_idle());
        assert_eq!(h.stats.protocol().verifications_timed_out, 0);
    }
}
