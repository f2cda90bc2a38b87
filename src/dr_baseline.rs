//! PIR-only baseline
//!
//! What a naive deployment would report: every stimulus is classified once,
//! with a single confidence draw and a flat threshold, no tiers and no peers.
//! The draws come from a fresh stream seeded like the main run, so the
//! baseline is as reproducible as the run it is compared against.

use serde::Serialize;

use crate::dr_config::ImageModelConfig;
use crate::dr_interface::SensorEvent;
use crate::dr_random::RandomStream;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaselineResult {
    pub detection_rate: f64,
    pub false_positive_rate: f64,
    pub total_detections: u64,
}

pub fn compute_baseline(
    events: &[SensorEvent],
    seed: u64,
    model: &ImageModelConfig,
    naive_threshold: f64,
) -> BaselineResult {
    let mut rng = RandomStream::new(seed);
    let mut true_positives = 0u64;
    let mut false_positives = 0u64;

    for event in events {
        let (mean, std_dev) = model.params(event.is_intruder);
        let confidence = rng.gaussian(mean, std_dev);
        if confidence > naive_threshold {
            if event.is_intruder {
                true_positives += 1;
            } else {
                false_positives += 1;
            }
        }
    }

    let intruders = events.iter().filter(|e| e.is_intruder).count() as u64;
    let noise = events.len() as u64 - intruders;

    BaselineResult {
        detection_rate: if intruders > 0 {
            true_positives as f64 / intruders as f64
        } else {
            0.0
        },
        false_positive_rate: if noise > 0 {
            false_positives as f64 / noise as f64
        } else {
            0.0
        },
        total_detections: true_positives + false_positives,
    }
}
