//! Simulation driver
//!
//! Owns every piece of one run: the scheduler, the random stream, the
//! statistics collector, the event generator, the gateway and the nodes.
//! Two runs never share mutable state.

use log::{info, warn};

use crate::dr_baseline::compute_baseline;
use crate::dr_config::{ConfigError, ConfigWarning, SimConfig};
use crate::dr_context::{Action, Schedulable, SimContext, Target};
use crate::dr_gateway::Gateway;
use crate::dr_generator::EventGenerator;
use crate::dr_interface::{EventSink, NoOpSink};
use crate::dr_node::PerimeterNode;
use crate::dr_random::RandomStream;
use crate::dr_scheduler::Scheduler;
use crate::dr_stats::{SimulationResult, StatsCollector};
use crate::dr_topology::Topology;

pub struct Simulation {
    config: SimConfig,
    topology: Topology,
    scheduler: Scheduler<Action>,
    rng: RandomStream,
    stats: StatsCollector,
    generator: EventGenerator,
    gateway: Gateway,
    nodes: Vec<PerimeterNode>,
    sink: Box<dyn EventSink>,
    warnings: Vec<ConfigWarning>,
}

impl Simulation {
    /// Validate `config` and build the topology. No event is scheduled yet.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        Self::new_with_sink(config, Box::new(NoOpSink))
    }

    /// Same as [`Simulation::new`] with a custom event sink for debugging/analysis
    pub fn new_with_sink(config: SimConfig, sink: Box<dyn EventSink>) -> Result<Self, ConfigError> {
        let warnings = config.validate()?;
        let topology = Topology::build(&config.topology);
        Ok(Self::assemble(config, topology, sink, warnings))
    }

    /// Run on an explicit node placement instead of the configured rings
    pub fn with_topology(
        config: SimConfig,
        topology: Topology,
        sink: Box<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        let warnings = config.validate()?;
        Ok(Self::assemble(config, topology, sink, warnings))
    }

    fn assemble(
        config: SimConfig,
        topology: Topology,
        sink: Box<dyn EventSink>,
        warnings: Vec<ConfigWarning>,
    ) -> Self {
        for warning in &warnings {
            warn!("{}", warning);
        }
        let summary = topology.summary();
        if summary.isolated_nodes > 0 {
            warn!(
                "{} of {} nodes have no P2P neighbour; their verifications can only time out",
                summary.isolated_nodes, summary.total_nodes
            );
        }

        Self {
            rng: RandomStream::new(config.random_seed),
            generator: EventGenerator::new(config.simulation.event_count),
            gateway: Gateway::new(&config.gateway),
            nodes: (0..topology.len()).map(PerimeterNode::new).collect(),
            scheduler: Scheduler::new(),
            stats: StatsCollector::new(),
            config,
            topology,
            sink,
            warnings,
        }
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Drive the run to completion and assemble the result record
    pub fn run(self) -> SimulationResult {
        let Simulation {
            config,
            topology,
            mut scheduler,
            mut rng,
            mut stats,
            mut generator,
            mut gateway,
            mut nodes,
            mut sink,
            ..
        } = self;

        let horizon = config.simulation.max_duration.unwrap_or(f64::INFINITY);
        info!(
            "starting run {}: {} nodes, {} events, seed {}",
            config.run_id.as_deref().unwrap_or("-"),
            topology.len(),
            config.simulation.event_count,
            config.random_seed
        );

        {
            let mut ctx = SimContext {
                scheduler: &mut scheduler,
                rng: &mut rng,
                stats: &mut stats,
                sink: &mut *sink,
                config: &config,
                topology: &topology,
                gateway_up: gateway.is_up(),
            };
            generator.start(&mut ctx);
            gateway.start(&mut ctx);
        }

        let dispatched = scheduler.run_until(horizon, |sched, action| {
            let target = action.target();
            if target == Target::Engine {
                sched.halt();
                return;
            }
            let mut ctx = SimContext {
                scheduler: sched,
                rng: &mut rng,
                stats: &mut stats,
                sink: &mut *sink,
                config: &config,
                topology: &topology,
                gateway_up: gateway.is_up(),
            };
            match target {
                Target::Generator => generator.handle(action, &mut ctx),
                Target::Node(id) => {
                    if let Some(node) = nodes.get_mut(id) {
                        node.handle(action, &mut ctx);
                    }
                }
                Target::Gateway => gateway.handle(action, &mut ctx),
                Target::Engine => {}
            }
        });

        info!(
            "run finished at t={:.1}s after {} actions ({} canceled, {} left queued)",
            scheduler.now(),
            dispatched,
            scheduler.skipped(),
            scheduler.queued()
        );

        let metrics = stats.finalize();
        let baseline = compute_baseline(
            generator.emitted(),
            config.random_seed,
            &config.image_model,
            config.baseline.naive_threshold,
        );

        SimulationResult {
            total_events: stats.total_events(),
            intruder_events: stats.intruder_events(),
            noise_events: stats.noise_events(),
            true_positives: stats.true_positives(),
            false_positives: stats.false_positives(),
            p2p_messages_sent: stats.p2p_messages_sent(),
            latencies: stats.latencies().to_vec(),
            detection_rate: metrics.detection_rate,
            false_positive_rate: metrics.false_positive_rate,
            mean_latency_seconds: metrics.mean_latency_seconds,
            max_latency_seconds: metrics.max_latency_seconds,
            p95_latency_seconds: metrics.p95_latency_seconds,
            total_detections: stats.total_detections(),
            unique_detections: stats.unique_detections(),
            protocol: stats.protocol(),
            gateway: stats.gateway_report(gateway.is_enabled()),
            baseline,
            topology: topology.summary(),
            run_id: config.run_id.clone(),
            seed: config.random_seed,
            sim_duration_seconds: scheduler.now(),
        }
    }
}

/// Validate, build and run `config` with no event sink
pub fn run_simulation(config: &SimConfig) -> Result<SimulationResult, ConfigError> {
    Ok(Simulation::new(config.clone())?.run())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::dr_interface::{Event, NodeId, SimTime};

    type Log = Rc<RefCell<Vec<(SimTime, Option<NodeId>, Event)>>>;

    struct SharedSink(Log);

    impl EventSink for SharedSink {
        fn log(&mut self, time: SimTime, node: Option<NodeId>, event: Event) {
            self.0.borrow_mut().push((time, node, event));
        }
    }

    fn small_config(events: u64) -> SimConfig {
        let mut config = SimConfig::default();
        config.simulation.event_count = events;
        config
    }

    fn assert_conserved(result: &SimulationResult) {
        assert_eq!(
            result.intruder_events + result.noise_events,
            result.total_events
        );
        assert_eq!(
            result.true_positives + result.false_positives,
            result.latencies.len() as u64
        );
        assert!(result.true_positives <= result.intruder_events);
        assert!(result.false_positives <= result.noise_events);
        assert!(result.unique_detections <= result.total_detections);
        assert_eq!(
            result.p2p_messages_sent,
            result.protocol.verify_requests_sent + result.protocol.verify_responses_sent
        );
        assert!(result.protocol.messages_lost <= result.p2p_messages_sent);
        assert!(result.latencies.iter().all(|&l| l >= 0.0));
        assert!((0.0..=1.0).contains(&result.detection_rate));
        assert!((0.0..=1.0).contains(&result.false_positive_rate));
    }

    #[test]
    fn test_same_seed_same_result() {
        let config = small_config(200);
        let a = run_simulation(&config).unwrap();
        let b = run_simulation(&config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut config = small_config(200);
        let a = run_simulation(&config).unwrap();
        config.random_seed = 43;
        let b = run_simulation(&config).unwrap();
        assert_ne!(a.latencies, b.latencies);
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_default_scenario() {
        let result = run_simulation(&SimConfig::default()).unwrap();
        assert_conserved(&result);

        assert_eq!(result.total_events, 1000);
        assert!(result.intruder_events > 240 && result.intruder_events < 360);
        assert!(result.detection_rate > 0.9, "{}", result.detection_rate);
        assert!(result.false_positive_rate < 0.15, "{}", result.false_positive_rate);
        assert!(result.p2p_messages_sent > 0);
        assert!(result.baseline.false_positive_rate > result.false_positive_rate);

        // every uplink lands before its verification window closes
        assert!(result.mean_latency_seconds >= 0.05);
        assert!(result.max_latency_seconds <= 0.05 + 3.0 + 1e-9);
        assert!(result.p95_latency_seconds <= result.max_latency_seconds);

        // the drain margin outlasts every timeout, so no round is left open
        let p = &result.protocol;
        assert_eq!(
            p.verifications_started,
            p.verifications_confirmed + p.verifications_timed_out
        );
        assert_eq!(result.topology.total_nodes, 16);
        assert_eq!(result.seed, 42);
    }

    #[test]
    fn test_isolated_nodes_never_confirm() {
        let mut config = small_config(300);
        config.topology.p2p_range = 1.0;
        let result = run_simulation(&config).unwrap();
        assert_conserved(&result);

        assert_eq!(result.topology.isolated_nodes, 16);
        assert_eq!(result.p2p_messages_sent, 0);
        assert_eq!(result.protocol.p2p_uplinks, 0);
        assert!(result.protocol.verifications_started > 0);
        assert_eq!(
            result.protocol.verifications_timed_out,
            result.protocol.verifications_started
        );
    }

    #[test]
    fn test_zero_confirm_threshold_skips_p2p() {
        let mut config = small_config(300);
        config.decision_logic.confirm_threshold = 0.0;
        let simulation = Simulation::new(config).unwrap();
        assert_eq!(simulation.warnings().len(), 1);

        let result = simulation.run();
        assert_conserved(&result);
        assert_eq!(result.p2p_messages_sent, 0);
        assert_eq!(result.protocol.verifications_started, 0);
        assert_eq!(result.protocol.p2p_uplinks, 0);
        assert!(result.false_positives > 0);
    }

    #[test]
    fn test_dispatch_times_never_decrease() {
        let log: Log = Rc::default();
        let simulation =
            Simulation::new_with_sink(small_config(150), Box::new(SharedSink(log.clone()))).unwrap();
        let result = simulation.run();

        let events = log.borrow();
        assert!(!events.is_empty());
        assert!(events.windows(2).all(|w| w[0].0 <= w[1].0));

        let uplinks = events
            .iter()
            .filter(|(_, _, e)| matches!(e, Event::Uplink { .. }))
            .count() as u64;
        assert_eq!(uplinks, result.total_detections);
        let first_reports = events
            .iter()
            .filter(|(_, _, e)| matches!(e, Event::Uplink { first_report: true, .. }))
            .count() as u64;
        assert_eq!(first_reports, result.unique_detections);
    }

    #[test]
    fn test_sink_does_not_change_outcome() {
        let config = small_config(150);
        let quiet = run_simulation(&config).unwrap();
        let log: Log = Rc::default();
        let observed = Simulation::new_with_sink(config, Box::new(SharedSink(log)))
            .unwrap()
            .run();
        assert_eq!(quiet, observed);
    }

    #[test]
    fn test_confirmed_rounds_cancel_their_timeouts() {
        let log: Log = Rc::default();
        let result = Simulation::new_with_sink(small_config(400), Box::new(SharedSink(log.clone())))
            .unwrap()
            .run();
        assert!(result.protocol.verifications_confirmed > 0);

        // a node never both confirms and times out the same round
        let events = log.borrow();
        for (_, node, event) in events.iter() {
            if let Event::VerificationConfirmed { event_id, .. } = event {
                assert!(!events.iter().any(|(_, n, e)| n == node
                    && *e == Event::VerificationTimedOut {
                        event_id: *event_id
                    }));
            }
        }
    }

    #[test]
    fn test_gateway_outages_are_reported() {
        let mut config = small_config(1000);
        config.gateway.enabled = true;
        config.gateway.up_duration_mean = 300.0;
        let result = run_simulation(&config).unwrap();
        assert_conserved(&result);

        assert!(result.gateway.enabled);
        assert!(result.gateway.detections_during_outage > 0);
        assert!(result.gateway.detections_during_outage <= result.unique_detections);
    }

    #[test]
    fn test_disabled_gateway_reports_no_outage() {
        let config = small_config(200);
        let plain = run_simulation(&config).unwrap();
        assert!(!plain.gateway.enabled);
        assert_eq!(plain.gateway.detections_during_outage, 0);
    }

    #[test]
    fn test_lossy_links() {
        let mut config = small_config(400);
        config.communication.loss_base = 0.5;
        let result = run_simulation(&config).unwrap();
        assert_conserved(&result);
        assert!(result.protocol.messages_lost > 0);
    }

    #[test]
    fn test_max_duration_caps_run() {
        let mut config = small_config(1000);
        config.simulation.max_duration = Some(100.0);
        let result = run_simulation(&config).unwrap();
        assert_conserved(&result);
        assert!(result.sim_duration_seconds <= 100.0);
        assert!(result.total_events < 1000);
    }

    #[test]
    fn test_run_ends_after_drain_margin() {
        let log: Log = Rc::default();
        let result = Simulation::new_with_sink(small_config(20), Box::new(SharedSink(log.clone())))
            .unwrap()
            .run();
        let events = log.borrow();
        let exhausted_at = events
            .iter()
            .find(|(_, _, e)| matches!(e, Event::GeneratorExhausted { emitted: 20 }))
            .map(|(t, _, _)| *t)
            .unwrap();
        assert!((result.sim_duration_seconds - (exhausted_at + 200.0)).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = small_config(10);
        config.topology.outer_ring_nodes = 0;
        assert!(Simulation::new(config).is_err());

        let mut config = small_config(10);
        config.simulation.event_count = 0;
        assert!(run_simulation(&config).is_err());
    }

    #[test]
    fn test_custom_topology() {
        use crate::dr_interface::{Position, Ring};
        use crate::dr_topology::NodeSpec;

        let nodes = vec![
            NodeSpec {
                id: 0,
                label: "west".into(),
                ring: Ring::Outer,
                position: Position::new(-5.0, 0.0),
            },
            NodeSpec {
                id: 1,
                label: "east".into(),
                ring: Ring::Inner,
                position: Position::new(5.0, 0.0),
            },
        ];
        let mut config = small_config(100);
        config.simulation.field_half_width = 5.0;
        let topology = Topology::from_nodes(nodes, 15.0, 20.0);
        let result = Simulation::with_topology(config, topology, Box::new(NoOpSink))
            .unwrap()
            .run();
        assert_conserved(&result);
        assert_eq!(result.topology.total_nodes, 2);
        assert_eq!(result.topology.min_degree, 1);
        assert!(result.detection_rate > 0.9);
    }
}
