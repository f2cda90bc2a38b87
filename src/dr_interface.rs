use serde::{Deserialize, Serialize};

// virtual seconds since the start of a run
pub type SimTime = f64;

// nodes are numbered outer ring first, then inner ring
pub type NodeId = usize;
pub type EventId = u64;

/// Floor applied to every P2P delivery delay (seconds)
pub const MIN_P2P_DELAY: SimTime = 0.01;

#[derive(Copy, Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ring {
    Outer,
    Inner,
}

impl Ring {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ring::Outer => "outer",
            Ring::Inner => "inner",
        }
    }
}

/// A stimulus in the monitored field. Ground truth travels with the event so
/// every detection can be classified against it, never against node belief.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SensorEvent {
    pub id: EventId,
    pub origin: Position,
    pub is_intruder: bool,
    pub time_emitted: SimTime,
}

/// Confidence band a reading falls into
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tier {
    /// Report immediately
    Confirm,
    /// Ask neighbours to corroborate
    Verify,
    /// Drop
    Ignore,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Confirm => "confirm",
            Tier::Verify => "verify",
            Tier::Ignore => "ignore",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    VerifyRequest,
    VerifyResponse,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum P2pMessage {
    VerifyRequest { from: NodeId, event: SensorEvent },
    VerifyResponse { from: NodeId, event_id: EventId },
}

impl P2pMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            P2pMessage::VerifyRequest { .. } => MessageKind::VerifyRequest,
            P2pMessage::VerifyResponse { .. } => MessageKind::VerifyResponse,
        }
    }

    pub fn sender(&self) -> NodeId {
        match self {
            P2pMessage::VerifyRequest { from, .. } | P2pMessage::VerifyResponse { from, .. } => {
                *from
            }
        }
    }
}

/// A detection reported upstream by a node
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Uplink {
    pub event_id: EventId,
    pub node: NodeId,
    pub is_intruder: bool,
    pub latency: SimTime,
    pub p2p_used: bool,
    pub confidence: f64,
}

// ============================================================================
// Event Logging System
// ============================================================================

/// Protocol observations emitted while a run executes, for debugging and analysis
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Generator placed a new stimulus in the field
    StimulusEmitted {
        event_id: EventId,
        is_intruder: bool,
        sensed_by: usize,
    },
    /// Node evaluated a trigger
    TriggerEvaluated {
        event_id: EventId,
        confidence: f64,
        tier: Tier,
    },
    /// P2P message handed to the channel
    MessageSent {
        kind: MessageKind,
        event_id: EventId,
        to: NodeId,
        delay: SimTime,
    },
    /// P2P message dropped by the loss model
    MessageLost {
        kind: MessageKind,
        event_id: EventId,
        to: NodeId,
    },
    VerificationConfirmed {
        event_id: EventId,
        by: NodeId,
    },
    VerificationTimedOut {
        event_id: EventId,
    },
    /// Borderline reading while a verification was already in flight
    VerificationSuppressed {
        event_id: EventId,
        pending: EventId,
    },
    /// Response that no longer matches an open verification
    StaleResponse {
        event_id: EventId,
        from: NodeId,
    },
    Uplink {
        event_id: EventId,
        p2p_used: bool,
        latency: SimTime,
        first_report: bool,
    },
    GatewayStateChanged {
        up: bool,
    },
    GeneratorExhausted {
        emitted: u64,
    },
}

/// Trait for consuming events from the simulation
pub trait EventSink {
    fn log(&mut self, time: SimTime, node: Option<NodeId>, event: Event);
}

/// No-op event sink for batch runs (zero overhead)
pub struct NoOpSink;

impl EventSink for NoOpSink {
    #[inline(always)]
    fn log(&mut self, _time: SimTime, _node: Option<NodeId>, _event: Event) {}
}

/// Keeps every event in memory; used by tests to inspect a run's timeline
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub events: Vec<(SimTime, Option<NodeId>, Event)>,
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn log(&mut self, time: SimTime, node: Option<NodeId>, event: Event) {
        self.events.push((time, node, event));
    }
}
