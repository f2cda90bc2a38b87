//! # dr_rust - Dual-Ring Perimeter Detection Simulator
//!
//! A discrete-event simulation of a two-ring wireless sensor perimeter.
//! Each node pairs a motion trigger with an image classifier and reports
//! detections upstream. Readings that are neither clearly an intruder nor
//! clearly noise are corroborated over peer-to-peer links before they are
//! reported.
//!
//! ## Core Components
//!
//! - **Scheduler**: virtual clock with deterministic tie-breaking and cancelable actions
//! - **EventGenerator**: renewal process placing labelled stimuli in the field
//! - **PerimeterNode**: three-tier decision state machine with P2P verification
//! - **StatsCollector**: detection, false-positive, latency and messaging counters
//! - **Topology**: dual-ring placement and P2P neighbour sets
//!
//! ## Usage
//!
//! ```no_run
//! use dr_rust::{run_simulation, SimConfig};
//!
//! let mut config = SimConfig::default();
//! config.random_seed = 7;
//!
//! let result = run_simulation(&config).expect("valid configuration");
//! result.print_summary();
//! ```
//!
//! The same seed and configuration always produce the same result record.
//! Scenario files and batch runs live in the `simulator/` binaries.

// Simulation engine
pub mod dr_context;
pub mod dr_random;
pub mod dr_scheduler;
pub mod dr_simulation;

// Protocol entities
pub mod dr_gateway;
pub mod dr_generator;
pub mod dr_node;

// Model and reporting
pub mod dr_baseline;
pub mod dr_config;
pub mod dr_interface;
pub mod dr_stats;
pub mod dr_topology;

// Re-export commonly used types
pub use dr_config::{ConfigError, ConfigWarning, SimConfig};
pub use dr_interface::{
    Event, EventId, EventSink, NoOpSink, NodeId, Position, Ring, SensorEvent, SimTime, Tier,
};
pub use dr_simulation::{run_simulation, Simulation};
pub use dr_stats::SimulationResult;
pub use dr_topology::{Topology, TopologySummary};
