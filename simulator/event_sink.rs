// Event sink that renders protocol events through the `log` facade

use dr_rust::dr_interface::{Event, EventSink, NodeId, SimTime};
use log::{debug, info};

/// Per-message traffic goes to `debug!`, state changes of the run to `info!`
pub struct LoggingEventSink {
    enabled: bool,
    logged: u64,
}

impl LoggingEventSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, logged: 0 }
    }
}

impl EventSink for LoggingEventSink {
    fn log(&mut self, time: SimTime, node: Option<NodeId>, event: Event) {
        if !self.enabled {
            return;
        }
        self.logged += 1;

        let who = match node {
            Some(id) => format!("node {:>3}", id),
            None => "sim     ".to_string(),
        };

        match event {
            Event::StimulusEmitted {
                event_id,
                is_intruder,
                sensed_by,
            } => debug!(
                "[{:>9.3}] {} STIMULUS {} {} sensed_by={}",
                time,
                who,
                event_id,
                if is_intruder { "intruder" } else { "noise" },
                sensed_by
            ),
            Event::TriggerEvaluated {
                event_id,
                confidence,
                tier,
            } => debug!(
                "[{:>9.3}] {} TRIGGER {} confidence={:.3} tier={}",
                time,
                who,
                event_id,
                confidence,
                tier.as_str()
            ),
            Event::MessageSent {
                kind,
                event_id,
                to,
                delay,
            } => debug!(
                "[{:>9.3}] {} SEND {:?} event={} to={} delay={:.3}",
                time, who, kind, event_id, to, delay
            ),
            Event::MessageLost { kind, event_id, to } => debug!(
                "[{:>9.3}] {} LOST {:?} event={} to={}",
                time, who, kind, event_id, to
            ),
            Event::VerificationConfirmed { event_id, by } => debug!(
                "[{:>9.3}] {} CONFIRMED event={} by={}",
                time, who, event_id, by
            ),
            Event::VerificationTimedOut { event_id } => {
                debug!("[{:>9.3}] {} TIMEOUT event={}", time, who, event_id)
            }
            Event::VerificationSuppressed { event_id, pending } => debug!(
                "[{:>9.3}] {} SUPPRESSED event={} pending={}",
                time, who, event_id, pending
            ),
            Event::StaleResponse { event_id, from } => debug!(
                "[{:>9.3}] {} STALE event={} from={}",
                time, who, event_id, from
            ),
            Event::Uplink {
                event_id,
                p2p_used,
                latency,
                first_report,
            } => debug!(
                "[{:>9.3}] {} UPLINK event={} p2p={} latency={:.3}{}",
                time,
                who,
                event_id,
                p2p_used,
                latency,
                if first_report { "" } else { " (duplicate)" }
            ),
            Event::GatewayStateChanged { up } => info!(
                "[{:>9.3}] gateway {}",
                time,
                if up { "UP" } else { "DOWN" }
            ),
            Event::GeneratorExhausted { emitted } => info!(
                "[{:>9.3}] generator exhausted after {} events ({} sink events so far)",
                time, emitted, self.logged
            ),
        }
    }
}
