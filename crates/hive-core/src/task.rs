//! Task domain model.
//!
//! Priority crosses the wire as a small integer code (0-3). Decoding is
//! lossy by contract: any out-of-range code collapses to `Medium` instead
//! of failing the request.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{TaskId, UserId};

/// Closed set of task priorities.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    /// Wire code, 0-3.
    pub fn code(self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }

    /// Decode a wire code. Out-of-range collapses to `Medium`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Low,
            1 => Self::Medium,
            2 => Self::High,
            3 => Self::Urgent,
            _ => Self::Medium,
        }
    }

    /// Lowercase label used for storage and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// Decode a stored label. Unknown labels collapse to `Medium`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "urgent" => Self::Urgent,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskPriority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for TaskPriority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Ok(Self::from_code(code))
    }
}

/// A short-lived work item owned by one user.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Aggregate counts over one user's tasks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
    pub completion_rate: f64,
}

impl TaskStats {
    /// Derive pending and completion rate from the two stored counts.
    /// An empty task set has a completion rate of 0.0, not NaN.
    pub fn from_counts(total: i64, completed: i64) -> Self {
        let rate = if total > 0 {
            completed as f64 / total as f64
        } else {
            0.0
        };
        Self {
            total,
            completed,
            pending: total - completed,
            completion_rate: rate,
        }
    }
}

/// Optional narrowing applied to task lists and task-feed subscriptions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(completed) = self.completed {
            if task.completed != completed {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_none() && self.priority.is_none()
    }
}
