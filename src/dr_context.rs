//! Run context threaded through every entity
//!
//! Nodes, the event generator and the gateway never hold references to each
//! other or to shared globals. Each dispatched [`Action`] is routed to one
//! entity together with a [`SimContext`] borrowing the run's scheduler,
//! random stream, statistics and event sink.

use log::debug;

use crate::dr_config::SimConfig;
use crate::dr_interface::{
    Event, EventId, EventSink, NodeId, P2pMessage, SensorEvent, SimTime, MIN_P2P_DELAY,
};
use crate::dr_random::RandomStream;
use crate::dr_scheduler::{EventHandle, Scheduler};
use crate::dr_stats::StatsCollector;
use crate::dr_topology::Topology;

/// Everything that can sit in the scheduler queue
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Emit the next stimulus
    Generate,
    /// Stimulus reaches a node's sensor
    SensorTrigger { node: NodeId, event: SensorEvent },
    /// P2P message arrives at `to`
    Deliver { to: NodeId, message: P2pMessage },
    VerificationTimeout { node: NodeId, event_id: EventId },
    GatewayToggle,
    /// End of the drain period after the last stimulus
    Shutdown,
}

/// Entity an action is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Generator,
    Node(NodeId),
    Gateway,
    Engine,
}

impl Action {
    pub fn target(&self) -> Target {
        match self {
            Action::Generate => Target::Generator,
            Action::SensorTrigger { node, .. } | Action::VerificationTimeout { node, .. } => {
                Target::Node(*node)
            }
            Action::Deliver { to, .. } => Target::Node(*to),
            Action::GatewayToggle => Target::Gateway,
            Action::Shutdown => Target::Engine,
        }
    }
}

/// Anything that reacts to scheduled actions
pub trait Schedulable {
    fn handle(&mut self, action: Action, ctx: &mut SimContext<'_>);
}

pub struct SimContext<'a> {
    pub scheduler: &'a mut Scheduler<Action>,
    pub rng: &'a mut RandomStream,
    pub stats: &'a mut StatsCollector,
    pub sink: &'a mut dyn EventSink,
    pub config: &'a SimConfig,
    pub topology: &'a Topology,
    /// Gateway availability at dispatch time
    pub gateway_up: bool,
}

impl<'a> SimContext<'a> {
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn schedule(&mut self, delay: SimTime, action: Action) -> EventHandle {
        self.scheduler.schedule(delay, action)
    }

    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    pub fn emit(&mut self, node: Option<NodeId>, event: Event) {
        let now = self.scheduler.now();
        self.sink.log(now, node, event);
    }

    /// Label-conditioned classifier confidence, clamped to [0, 1]
    pub fn draw_confidence(&mut self, is_intruder: bool) -> f64 {
        let (mean, std_dev) = self.config.image_model.params(is_intruder);
        self.rng.gaussian(mean, std_dev)
    }

    /// Hand a message to the abstract link between `from` and `to`.
    ///
    /// The transmission is always counted. Loss is drawn only when the loss
    /// probability for the distance is positive; jitter only when configured.
    pub fn send_p2p(&mut self, from: NodeId, to: NodeId, message: P2pMessage) {
        let kind = message.kind();
        let event_id = match message {
            P2pMessage::VerifyRequest { event, .. } => event.id,
            P2pMessage::VerifyResponse { event_id, .. } => event_id,
        };
        self.stats.record_p2p_message(kind);

        let distance = self.topology.distance(from, to).unwrap_or(0.0);
        let config = self.config;
        let comm = &config.communication;

        let p_loss = comm.loss_probability(distance);
        if p_loss > 0.0 && self.rng.uniform(0.0, 1.0) < p_loss {
            self.stats.record_message_lost();
            debug!("{:?} {} -> {} lost ({:.1}m)", kind, from, to, distance);
            self.emit(Some(from), Event::MessageLost { kind, event_id, to });
            return;
        }

        let jitter = if comm.delay_jitter > 0.0 {
            self.rng.uniform(-comm.delay_jitter, comm.delay_jitter)
        } else {
            0.0
        };
        let airtime = config.message_sizes.size_of(kind) as f64 * comm.airtime_per_byte;
        let delay =
            (airtime + comm.delay_base + comm.delay_per_meter * distance + jitter).max(MIN_P2P_DELAY);

        self.scheduler.schedule(delay, Action::Deliver { to, message });
        self.emit(
            Some(from),
            Event::MessageSent {
                kind,
                event_id,
                to,
                delay,
            },
        );
    }
}
