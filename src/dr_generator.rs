//! Stimulus generator
//!
//! A renewal process: the first stimulus fires after one exponential
//! inter-arrival draw, and each generation step draws, in this order, the
//! ground-truth label, the x and y coordinates, and (if events remain) the
//! next inter-arrival time. After the last stimulus the generator schedules
//! the end of the run one drain margin later.

use log::{debug, info};

use crate::dr_context::{Action, Schedulable, SimContext};
use crate::dr_interface::{Event, EventId, Position, SensorEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Active { remaining: u64 },
    Exhausted,
}

pub struct EventGenerator {
    state: GeneratorState,
    next_id: EventId,
    emitted: Vec<SensorEvent>,
}

impl EventGenerator {
    pub fn new(total_events: u64) -> Self {
        let state = if total_events == 0 {
            GeneratorState::Exhausted
        } else {
            GeneratorState::Active {
                remaining: total_events,
            }
        };
        Self {
            state,
            next_id: 0,
            emitted: Vec::new(),
        }
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Stimuli emitted so far, in emission order
    pub fn emitted(&self) -> &[SensorEvent] {
        &self.emitted
    }

    /// Schedule the first generation step
    pub fn start(&mut self, ctx: &mut SimContext<'_>) {
        if let GeneratorState::Active { .. } = self.state {
            let interval = ctx.rng.exponential(ctx.config.simulation.event_interval_mean);
            ctx.schedule(interval, Action::Generate);
        }
    }

    fn generate(&mut self, ctx: &mut SimContext<'_>) {
        let remaining = match self.state {
            GeneratorState::Active { remaining } => remaining,
            GeneratorState::Exhausted => return,
        };
        let sim = &ctx.config.simulation;
        let half_width = sim.field_half_width;
        let processing_delay = sim.processing_delay;
        let interval_mean = sim.event_interval_mean;
        let drain_margin = sim.drain_margin;

        let is_intruder = ctx.rng.bernoulli(sim.intruder_probability);
        let x = ctx.rng.uniform(-half_width, half_width);
        let y = ctx.rng.uniform(-half_width, half_width);
        let event = SensorEvent {
            id: self.next_id,
            origin: Position::new(x, y),
            is_intruder,
            time_emitted: ctx.now(),
        };
        self.next_id += 1;
        ctx.stats.record_event(is_intruder);

        let topology = ctx.topology;
        let mut sensed_by = 0;
        for node in topology.nodes_in_sensor_range(event.origin) {
            ctx.schedule(processing_delay, Action::SensorTrigger { node, event });
            sensed_by += 1;
        }
        debug!(
            "event {} at ({:.1}, {:.1}) intruder={} sensed by {}",
            event.id, x, y, is_intruder, sensed_by
        );
        ctx.emit(
            None,
            Event::StimulusEmitted {
                event_id: event.id,
                is_intruder,
                sensed_by,
            },
        );
        self.emitted.push(event);

        if remaining <= 1 {
            self.state = GeneratorState::Exhausted;
            info!(
                "generator exhausted after {} events at t={:.1}s",
                self.next_id,
                ctx.now()
            );
            ctx.emit(
                None,
                Event::GeneratorExhausted {
                    emitted: self.next_id,
                },
            );
            ctx.schedule(drain_margin, Action::Shutdown);
        } else {
            self.state = GeneratorState::Active {
                remaining: remaining - 1,
            };
            let interval = ctx.rng.exponential(interval_mean);
            ctx.schedule(interval, Action::Generate);
        }
    }
}

impl Schedulable for EventGenerator {
    fn handle(&mut self, action: Action, ctx: &mut SimContext<'_>) {
        if let Action::Generate = action {
            self.generate(ctx);
        }
    }
}
