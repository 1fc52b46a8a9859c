//! Caller-level monitoring policies built on the pipeline outputs.
//!
//! The signal pipeline never enters a failure state of its own. Lead-off,
//! sustained absence of heartbeats and sustained poor quality are decided here,
//! from the contact status and the pipeline's outputs. Because the beat flag is
//! read-once, the time of the last detection is tracked on this side.

use crate::config::MonitorConfig;
use serde::{Deserialize, Serialize};

/// Fault condition reported to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorCondition {
    Ok,
    LeadsDisconnected,
    PoorSignal,
    NoHeartbeat,
}

impl MonitorCondition {
    /// Stable numeric code for status displays.
    pub fn code(&self) -> u8 {
        match self {
            MonitorCondition::Ok => 0,
            MonitorCondition::LeadsDisconnected => 3,
            MonitorCondition::PoorSignal => 4,
            MonitorCondition::NoHeartbeat => 5,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MonitorCondition::Ok => "signal ok",
            MonitorCondition::LeadsDisconnected => "electrode leads disconnected",
            MonitorCondition::PoorSignal => "signal quality below minimum",
            MonitorCondition::NoHeartbeat => "no heartbeat detected",
        }
    }
}

/// Overall lifecycle state of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    /// No reading seen yet
    Initializing,
    /// Leads connected, sample window still filling
    Ready,
    /// Producing heart rate and quality
    Monitoring,
    /// A fault condition is active
    Error,
}

/// Change in electrode contact between two readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadTransition {
    Unchanged,
    Disconnected,
    Reconnected,
}

/// Pipeline outputs for one processed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub now_ms: u64,
    pub beat_detected: bool,
    pub quality: u8,
    /// Whether the raw window has filled, i.e. quality is meaningful
    pub warmed_up: bool,
}

/// Evaluates fault conditions sample by sample.
#[derive(Debug, Clone)]
pub struct Monitor {
    heartbeat_timeout_ms: u64,
    min_signal_quality: u8,
    leads_connected: Option<bool>,
    /// Last beat, or the moment contact was (re)established
    beat_reference_ms: Option<u64>,
    last_beat_ms: Option<u64>,
    warmed_up: bool,
    condition: MonitorCondition,
}

impl Monitor {
    pub fn new(config: &MonitorConfig, min_signal_quality: u8) -> Self {
        Self {
            heartbeat_timeout_ms: config.heartbeat_timeout.as_millis() as u64,
            min_signal_quality,
            leads_connected: None,
            beat_reference_ms: None,
            last_beat_ms: None,
            warmed_up: false,
            condition: MonitorCondition::Ok,
        }
    }

    /// Record the contact status of the latest reading.
    pub fn update_leads(&mut self, connected: bool, now_ms: u64) -> LeadTransition {
        let previous = self.leads_connected.replace(connected);

        let transition = match (previous, connected) {
            (Some(true), false) | (None, false) => LeadTransition::Disconnected,
            (Some(false), true) => LeadTransition::Reconnected,
            _ => LeadTransition::Unchanged,
        };

        match transition {
            LeadTransition::Disconnected => {
                self.warmed_up = false;
                self.set_condition(MonitorCondition::LeadsDisconnected, now_ms);
            }
            LeadTransition::Reconnected => {
                self.beat_reference_ms = Some(now_ms);
            }
            LeadTransition::Unchanged if previous.is_none() => {
                self.beat_reference_ms = Some(now_ms);
            }
            LeadTransition::Unchanged => {}
        }

        transition
    }

    /// Evaluate conditions after a sample went through the pipeline.
    pub fn observe(&mut self, observation: Observation) -> MonitorCondition {
        if observation.beat_detected {
            self.last_beat_ms = Some(observation.now_ms);
            self.beat_reference_ms = Some(observation.now_ms);
        }
        self.warmed_up = observation.warmed_up;

        let reference = *self.beat_reference_ms.get_or_insert(observation.now_ms);
        let since_beat = observation.now_ms.saturating_sub(reference);

        let condition = if self.leads_connected == Some(false) {
            MonitorCondition::LeadsDisconnected
        } else if since_beat > self.heartbeat_timeout_ms {
            MonitorCondition::NoHeartbeat
        } else if observation.warmed_up && observation.quality < self.min_signal_quality {
            MonitorCondition::PoorSignal
        } else {
            MonitorCondition::Ok
        };

        self.set_condition(condition, observation.now_ms);
        condition
    }

    fn set_condition(&mut self, condition: MonitorCondition, now_ms: u64) {
        if condition == self.condition {
            return;
        }
        if condition == MonitorCondition::Ok {
            tracing::info!(
                at_ms = now_ms,
                cleared = self.condition.description(),
                "monitor condition cleared"
            );
        } else {
            tracing::warn!(
                at_ms = now_ms,
                code = condition.code(),
                "{}",
                condition.description()
            );
        }
        self.condition = condition;
    }

    pub fn condition(&self) -> MonitorCondition {
        self.condition
    }

    pub fn status(&self) -> SystemStatus {
        match (self.leads_connected, self.condition) {
            (None, _) => SystemStatus::Initializing,
            (_, MonitorCondition::Ok) if self.warmed_up => SystemStatus::Monitoring,
            (_, MonitorCondition::Ok) => SystemStatus::Ready,
            _ => SystemStatus::Error,
        }
    }

    pub fn leads_connected(&self) -> bool {
        self.leads_connected.unwrap_or(false)
    }

    /// Time of the last beat observed through the detected flag.
    pub fn last_beat_ms(&self) -> Option<u64> {
        self.last_beat_ms
    }
}
