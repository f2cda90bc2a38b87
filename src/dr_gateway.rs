//! Gateway availability
//!
//! Optional two-state model of the upstream gateway. Up and down periods are
//! exponentially distributed. Uplinks are always recorded; the collector only
//! notes which of them happened while the gateway was down.

use log::info;

use crate::dr_config::GatewayConfig;
use crate::dr_context::{Action, Schedulable, SimContext};
use crate::dr_interface::Event;

pub struct Gateway {
    enabled: bool,
    up: bool,
    transitions: u64,
    up_mean: f64,
    down_mean: f64,
}

impl Gateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            enabled: config.enabled,
            up: true,
            transitions: 0,
            up_mean: config.up_duration_mean,
            down_mean: config.down_duration_mean,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A disabled gateway is always up
    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Schedule the first outage. Does nothing (and draws nothing) when disabled.
    pub fn start(&mut self, ctx: &mut SimContext<'_>) {
        if !self.enabled {
            return;
        }
        let period = ctx.rng.exponential(self.up_mean);
        ctx.schedule(period, Action::GatewayToggle);
    }

    fn toggle(&mut self, ctx: &mut SimContext<'_>) {
        if !self.enabled {
            return;
        }
        self.up = !self.up;
        self.transitions += 1;
        info!(
            "gateway {} at t={:.1}s",
            if self.up { "restored" } else { "down" },
            ctx.now()
        );
        ctx.emit(None, Event::GatewayStateChanged { up: self.up });

        let mean = if self.up { self.up_mean } else { self.down_mean };
        let period = ctx.rng.exponential(mean);
        ctx.schedule(period, Action::GatewayToggle);
    }
}

impl Schedulable for Gateway {
    fn handle(&mut self, action: Action, ctx: &mut SimContext<'_>) {
        if let Action::GatewayToggle = action {
            self.toggle(ctx);
        }
    }
}
