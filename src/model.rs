//! Core data model: container records, metric samples, visibility flags.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Observed container status, as reported by the backend.
///
/// A closed enumeration: the client observes status changes, it never
/// asserts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Processing,
    Running,
    Stopped,
    Error,
    Paused,
}

impl ContainerStatus {
    /// Whether a stop command may be offered for this status.
    pub fn can_stop(self) -> bool {
        match self {
            ContainerStatus::Running | ContainerStatus::Paused => true,
            ContainerStatus::Processing | ContainerStatus::Stopped | ContainerStatus::Error => {
                false
            }
        }
    }

    /// Whether a start command may be offered for this status.
    pub fn can_start(self) -> bool {
        match self {
            ContainerStatus::Stopped | ContainerStatus::Error => true,
            ContainerStatus::Processing | ContainerStatus::Running | ContainerStatus::Paused => {
                false
            }
        }
    }

    /// Pause is only valid while running.
    pub fn can_pause(self) -> bool {
        matches!(self, ContainerStatus::Running)
    }

    /// Resume is only valid while paused.
    pub fn can_resume(self) -> bool {
        matches!(self, ContainerStatus::Paused)
    }

    /// Deletion requires the container to be stopped or failed.
    pub fn can_delete(self) -> bool {
        match self {
            ContainerStatus::Stopped | ContainerStatus::Error => true,
            ContainerStatus::Processing | ContainerStatus::Running | ContainerStatus::Paused => {
                false
            }
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerStatus::Processing => "processing",
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Error => "error",
            ContainerStatus::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// A state-transition command an operator can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTransition {
    Start,
    Stop,
    Pause,
    Resume,
}

impl StateTransition {
    /// Wire name, used as the command path segment.
    pub fn as_str(self) -> &'static str {
        match self {
            StateTransition::Start => "start",
            StateTransition::Stop => "stop",
            StateTransition::Pause => "pause",
            StateTransition::Resume => "resume",
        }
    }
}

impl fmt::Display for StateTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed container, as last observed from the list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    pub id_short: String,
    pub name: String,
    pub status: ContainerStatus,
    /// Unix timestamp of container creation.
    pub start_time: i64,
    /// Container port -> host ports bound to it.
    #[serde(default)]
    pub ports: BTreeMap<String, Vec<String>>,
}

/// The monitored metrics, in canonical column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricName {
    Cpu,
    Memory,
}

impl MetricName {
    /// Fixed iteration order; column ordering depends on it.
    pub const ALL: [MetricName; 2] = [MetricName::Cpu, MetricName::Memory];

    /// Name as it appears on the wire and in chart labels.
    pub fn wire_name(self) -> &'static str {
        match self {
            MetricName::Cpu => "CPU",
            MetricName::Memory => "memory",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One utilization sample; ratios are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: String,
    #[serde(rename = "CPU")]
    pub cpu: f64,
    pub memory: f64,
}

impl MetricSample {
    pub fn value(&self, metric: MetricName) -> f64 {
        match metric {
            MetricName::Cpu => self.cpu,
            MetricName::Memory => self.memory,
        }
    }
}

/// Sample history for one entity, ordered by timestamp ascending.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSeries {
    pub aliases: Vec<String>,
    pub stats: Vec<MetricSample>,
}

/// Full metrics snapshot keyed by entity id.
///
/// A BTreeMap so entity iteration order, and therefore chart column
/// order, is stable across refreshes.
pub type MetricsSnapshot = BTreeMap<String, MetricSeries>;

/// Per-metric chart visibility flags for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricVisibility {
    pub cpu: bool,
    pub memory: bool,
}

impl Default for MetricVisibility {
    /// Every metric starts visible when an entity is first observed.
    fn default() -> Self {
        Self {
            cpu: true,
            memory: true,
        }
    }
}

impl MetricVisibility {
    pub fn get(self, metric: MetricName) -> bool {
        match metric {
            MetricName::Cpu => self.cpu,
            MetricName::Memory => self.memory,
        }
    }

    pub fn set(&mut self, metric: MetricName, on: bool) {
        match metric {
            MetricName::Cpu => self.cpu = on,
            MetricName::Memory => self.memory = on,
        }
    }
}
