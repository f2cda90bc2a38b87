//! Simulation Configuration
//!
//! Every knob of a run lives in [`SimConfig`]. The YAML layout mirrors the
//! sectioned JSON accepted by the upstream job API, so either format loads
//! (JSON is valid YAML). Missing sections and fields fall back to defaults.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dr_interface::{MessageKind, SimTime, Tier};

/// Upper bound on events per run
pub const MAX_EVENT_COUNT: u64 = 100_000;

// ============================================================================
// Main Configuration
// ============================================================================

/// Main simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Free-form label carried into reports
    pub run_id: Option<String>,

    /// Seed for the single random stream of the run
    pub random_seed: u64,

    pub simulation: EventConfig,
    pub topology: TopologyConfig,
    pub decision_logic: DecisionConfig,
    pub image_model: ImageModelConfig,
    pub communication: CommunicationConfig,
    pub message_sizes: MessageSizes,
    pub gateway: GatewayConfig,
    pub baseline: BaselineConfig,
}

/// Event volume and run horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub event_count: u64,
    pub intruder_probability: f64,

    /// Mean of the exponential inter-arrival time (seconds)
    pub event_interval_mean: f64,

    /// Stimuli land uniformly in [-w, w] x [-w, w]
    pub field_half_width: f64,

    /// Delay between a stimulus and its delivery to a sensing node
    pub processing_delay: SimTime,

    /// Time the run keeps going after the last stimulus
    pub drain_margin: SimTime,

    /// Hard cap on virtual time
    pub max_duration: Option<SimTime>,
}

/// Dual-ring placement and radio ranges (metres, degrees)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub outer_ring_nodes: usize,
    pub inner_ring_nodes: usize,
    pub outer_ring_radius: f64,
    pub inner_ring_radius: f64,
    pub inner_ring_offset_deg: f64,
    pub sensor_range: f64,
    pub p2p_range: f64,
}

/// Tier thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub confirm_threshold: f64,
    pub verify_threshold: f64,
    pub verification_timeout: SimTime,
}

/// Label-conditioned confidence model of the on-node classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageModelConfig {
    #[serde(alias = "boar_confidence_mean")]
    pub intruder_mean: f64,
    #[serde(alias = "boar_confidence_std")]
    pub intruder_std: f64,
    #[serde(alias = "noise_confidence_mean")]
    pub noise_mean: f64,
    #[serde(alias = "noise_confidence_std")]
    pub noise_std: f64,
}

/// Abstract link model: distance-dependent loss and delay, no RF propagation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicationConfig {
    pub loss_base: f64,
    pub loss_per_meter: f64,
    pub delay_base: SimTime,
    pub delay_per_meter: SimTime,
    pub delay_jitter: SimTime,
    pub airtime_per_byte: SimTime,
}

/// Payload sizes in bytes, used for airtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSizes {
    pub verify_request: u32,
    pub verify_response: u32,
}

/// Optional up/down availability process for the upstream gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub enabled: bool,
    pub up_duration_mean: SimTime,
    pub down_duration_mean: SimTime,
}

/// PIR-only comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub naive_threshold: f64,
}

// ============================================================================
// Default Configurations
// ============================================================================

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            run_id: None,
            random_seed: 42,
            simulation: EventConfig::default(),
            topology: TopologyConfig::default(),
            decision_logic: DecisionConfig::default(),
            image_model: ImageModelConfig::default(),
            communication: CommunicationConfig::default(),
            message_sizes: MessageSizes::default(),
            gateway: GatewayConfig::default(),
            baseline: BaselineConfig::default(),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            event_count: 1000,
            intruder_probability: 0.30,
            event_interval_mean: 8.0,
            field_half_width: 25.0,
            processing_delay: 0.05,
            drain_margin: 200.0,
            max_duration: None,
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            outer_ring_nodes: 8,
            inner_ring_nodes: 8,
            outer_ring_radius: 23.0,
            inner_ring_radius: 14.0,
            inner_ring_offset_deg: 22.5,
            sensor_range: 15.0,
            p2p_range: 30.0,
        }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            confirm_threshold: 0.80,
            verify_threshold: 0.70,
            verification_timeout: 3.0,
        }
    }
}

impl Default for ImageModelConfig {
    fn default() -> Self {
        Self {
            intruder_mean: 0.85,
            intruder_std: 0.08,
            noise_mean: 0.35,
            noise_std: 0.15,
        }
    }
}

impl Default for CommunicationConfig {
    fn default() -> Self {
        Self {
            loss_base: 0.0,
            loss_per_meter: 0.0,
            delay_base: 0.1,
            delay_per_meter: 0.0001,
            delay_jitter: 0.05,
            airtime_per_byte: 0.002,
        }
    }
}

impl Default for MessageSizes {
    fn default() -> Self {
        Self {
            verify_request: 64,
            verify_response: 32,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            up_duration_mean: 1800.0,
            down_duration_mean: 300.0,
        }
    }
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            naive_threshold: 0.50,
        }
    }
}

// ============================================================================
// Derived values
// ============================================================================

impl DecisionConfig {
    pub fn classify(&self, confidence: f64) -> Tier {
        if confidence >= self.confirm_threshold {
            Tier::Confirm
        } else if confidence >= self.verify_threshold {
            Tier::Verify
        } else {
            Tier::Ignore
        }
    }
}

impl ImageModelConfig {
    /// (mean, std) of the confidence distribution for the given ground truth
    pub fn params(&self, is_intruder: bool) -> (f64, f64) {
        if is_intruder {
            (self.intruder_mean, self.intruder_std)
        } else {
            (self.noise_mean, self.noise_std)
        }
    }
}

impl CommunicationConfig {
    pub fn loss_probability(&self, distance: f64) -> f64 {
        (self.loss_base + self.loss_per_meter * distance).min(1.0)
    }
}

impl MessageSizes {
    pub fn size_of(&self, kind: MessageKind) -> u32 {
        match kind {
            MessageKind::VerifyRequest => self.verify_request,
            MessageKind::VerifyResponse => self.verify_response,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl SimConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn total_nodes(&self) -> usize {
        self.topology.outer_ring_nodes + self.topology.inner_ring_nodes
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Configuration rejected before any scheduling takes place
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{field} must be at least {min}, got {value}")]
    TooFew {
        field: &'static str,
        min: u64,
        value: u64,
    },

    #[error("{field} must be at most {max}, got {value}")]
    TooMany {
        field: &'static str,
        max: u64,
        value: u64,
    },

    #[error("{field} must be within [0, 1], got {value}")]
    NotAProbability { field: &'static str, value: f64 },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be finite and non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("outer_ring_radius ({outer}) must be greater than inner_ring_radius ({inner})")]
    RingOrder { outer: f64, inner: f64 },
}

/// Accepted but suspicious settings
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// verify > confirm leaves no room for Tier 2
    TierTwoUnreachable { verify: f64, confirm: f64 },

    /// Verifications opened by the last events may be cut off
    DrainShorterThanTimeout { drain: SimTime, timeout: SimTime },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::TierTwoUnreachable { verify, confirm } => write!(
                f,
                "verify_threshold ({}) is above confirm_threshold ({}); P2P verification is unreachable",
                verify, confirm
            ),
            ConfigWarning::DrainShorterThanTimeout { drain, timeout } => write!(
                f,
                "drain_margin ({}s) is shorter than verification_timeout ({}s)",
                drain, timeout
            ),
        }
    }
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::NotAProbability { field, value })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

fn at_least(field: &'static str, min: u64, value: u64) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::TooFew { field, min, value })
    }
}

impl SimConfig {
    /// Check the whole configuration, returning non-fatal diagnostics
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let sim = &self.simulation;
        at_least("event_count", 1, sim.event_count)?;
        if sim.event_count > MAX_EVENT_COUNT {
            return Err(ConfigError::TooMany {
                field: "event_count",
                max: MAX_EVENT_COUNT,
                value: sim.event_count,
            });
        }
        probability("intruder_probability", sim.intruder_probability)?;
        positive("event_interval_mean", sim.event_interval_mean)?;
        positive("field_half_width", sim.field_half_width)?;
        non_negative("processing_delay", sim.processing_delay)?;
        non_negative("drain_margin", sim.drain_margin)?;
        if let Some(max) = sim.max_duration {
            positive("max_duration", max)?;
        }

        let topo = &self.topology;
        at_least("outer_ring_nodes", 1, topo.outer_ring_nodes as u64)?;
        at_least("inner_ring_nodes", 1, topo.inner_ring_nodes as u64)?;
        positive("outer_ring_radius", topo.outer_ring_radius)?;
        positive("inner_ring_radius", topo.inner_ring_radius)?;
        if topo.outer_ring_radius <= topo.inner_ring_radius {
            return Err(ConfigError::RingOrder {
                outer: topo.outer_ring_radius,
                inner: topo.inner_ring_radius,
            });
        }
        if !topo.inner_ring_offset_deg.is_finite() {
            return Err(ConfigError::Negative {
                field: "inner_ring_offset_deg",
                value: topo.inner_ring_offset_deg,
            });
        }
        positive("sensor_range", topo.sensor_range)?;
        positive("p2p_range", topo.p2p_range)?;

        let decision = &self.decision_logic;
        probability("confirm_threshold", decision.confirm_threshold)?;
        probability("verify_threshold", decision.verify_threshold)?;
        non_negative("verification_timeout", decision.verification_timeout)?;

        let model = &self.image_model;
        probability("intruder_mean", model.intruder_mean)?;
        non_negative("intruder_std", model.intruder_std)?;
        probability("noise_mean", model.noise_mean)?;
        non_negative("noise_std", model.noise_std)?;

        let comm = &self.communication;
        probability("loss_base", comm.loss_base)?;
        non_negative("loss_per_meter", comm.loss_per_meter)?;
        non_negative("delay_base", comm.delay_base)?;
        non_negative("delay_per_meter", comm.delay_per_meter)?;
        non_negative("delay_jitter", comm.delay_jitter)?;
        non_negative("airtime_per_byte", comm.airtime_per_byte)?;

        if self.gateway.enabled {
            positive("up_duration_mean", self.gateway.up_duration_mean)?;
            positive("down_duration_mean", self.gateway.down_duration_mean)?;
        }

        probability("naive_threshold", self.baseline.naive_threshold)?;

        let mut warnings = Vec::new();
        if decision.verify_threshold > decision.confirm_threshold {
            warnings.push(ConfigWarning::TierTwoUnreachable {
                verify: decision.verify_threshold,
                confirm: decision.confirm_threshold,
            });
        }
        if sim.drain_margin < decision.verification_timeout {
            warnings.push(ConfigWarning::DrainShorterThanTimeout {
                drain: sim.drain_margin,
                timeout: decision.verification_timeout,
            });
        }
        Ok(warnings)
    }
}
