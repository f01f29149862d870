// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a test, suite, or launch as reported to the backend.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The unit and everything aggregated into it succeeded.
    #[default]
    Passed,
    /// The unit failed, or at least one unit aggregated into it failed.
    Failed,
}

impl TestStatus {
    /// Returns the status corresponding to a pass/fail outcome.
    pub fn from_success(success: bool) -> Self {
        if success { Self::Passed } else { Self::Failed }
    }

    /// Returns true if this status is [`TestStatus::Failed`].
    pub fn is_failed(self) -> bool {
        self == Self::Failed
    }

    /// Folds another status into this one.
    ///
    /// Aggregation is monotonic: once a status is failed it never reverts to
    /// passed, no matter how many passing units are folded in afterwards.
    pub fn escalate(&mut self, other: TestStatus) {
        if other.is_failed() {
            *self = Self::Failed;
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The semantic type of a remote item within a launch's hierarchy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// A root suite: the item representing an entire test bundle.
    Suite,
    /// A test suite nested under the root suite.
    Test,
    /// A single test case.
    Step,
}

/// The mode a launch is started in.
///
/// Debug launches are typically hidden from the default backend views.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LaunchMode {
    /// A regular launch.
    #[default]
    Default,
    /// A launch used for debugging the reporting setup itself.
    Debug,
}

/// Severity of a log entry attached to an item.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic output.
    Debug,
    /// Regular output, e.g. a test's captured log.
    Info,
    /// A recoverable problem.
    Warn,
    /// A failure report.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Body of a start-launch request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartLaunchRequest {
    /// Display name of the launch.
    pub name: String,
    /// Tags attached to the launch.
    pub tags: Vec<String>,
    /// The launch mode.
    pub mode: LaunchMode,
    /// When the launch started.
    pub start_time: DateTime<Utc>,
}

impl StartLaunchRequest {
    /// Creates a start-launch body stamped with the current time.
    pub fn new(name: impl Into<String>, tags: Vec<String>, mode: LaunchMode) -> Self {
        Self {
            name: name.into(),
            tags,
            mode,
            start_time: Utc::now(),
        }
    }
}

/// Body of a start-item request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartItemRequest {
    /// Display name of the item.
    pub name: String,
    /// The semantic type of the item.
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Identifier of the launch this item belongs to.
    pub launch_uuid: String,
    /// When the item started.
    pub start_time: DateTime<Utc>,
    /// Optional human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the backend should compute statistics for this item.
    pub has_stats: bool,
    /// Whether this item is a retry of an earlier one.
    pub retry: bool,
}

impl StartItemRequest {
    /// Creates a start-item body stamped with the current time.
    pub fn new(name: impl Into<String>, item_type: ItemType, launch_uuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_type,
            launch_uuid: launch_uuid.into(),
            start_time: Utc::now(),
            description: None,
            has_stats: false,
            retry: false,
        }
    }
}

/// Issue classification attached to a finished item.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// The backend's issue type code.
    pub issue_type: String,
    /// Free-form comment.
    pub comment: String,
    /// Whether the classification came from automated analysis.
    pub auto_analyzed: bool,
    /// Whether the backend's analyzer should skip this item.
    pub ignore_analyzer: bool,
}

impl Issue {
    // "ti001" is the backend's "to investigate" bucket, "nd001" is "no defect".
    const TO_INVESTIGATE: &'static str = "ti001";
    const NO_DEFECT: &'static str = "nd001";

    /// Returns the issue classification for a finish status.
    pub fn for_status(status: TestStatus) -> Self {
        let issue_type = if status.is_failed() {
            Self::TO_INVESTIGATE
        } else {
            Self::NO_DEFECT
        };
        Self {
            issue_type: issue_type.to_owned(),
            comment: String::new(),
            auto_analyzed: false,
            ignore_analyzer: true,
        }
    }
}

/// Body of a finish-item request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishItemRequest {
    /// When the item finished.
    pub end_time: DateTime<Utc>,
    /// The item's reported status.
    pub status: TestStatus,
    /// Issue classification derived from the status.
    pub issue: Issue,
}

impl FinishItemRequest {
    /// Creates a finish-item body stamped with the current time.
    pub fn new(status: TestStatus) -> Self {
        Self {
            end_time: Utc::now(),
            status,
            issue: Issue::for_status(status),
        }
    }
}

/// Body of a post-log request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostLogRequest {
    /// Identifier of the item the entry is attached to.
    pub item_uuid: String,
    /// Severity of the entry.
    pub level: LogLevel,
    /// The log message.
    pub message: String,
    /// When the entry was produced.
    pub time: DateTime<Utc>,
}

impl PostLogRequest {
    /// Creates a post-log body stamped with the current time.
    pub fn new(item_uuid: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            item_uuid: item_uuid.into(),
            level,
            message: message.into(),
            time: Utc::now(),
        }
    }
}

/// Body of a finish-launch request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishLaunchRequest {
    /// When the launch finished.
    pub end_time: DateTime<Utc>,
    /// The launch's aggregate status.
    pub status: TestStatus,
}

impl FinishLaunchRequest {
    /// Creates a finish-launch body stamped with the current time.
    pub fn new(status: TestStatus) -> Self {
        Self {
            end_time: Utc::now(),
            status,
        }
    }
}

/// Response to a start-launch or start-item request.
///
/// The identifier the backend assigned is the only field the agent consumes:
/// it becomes the parent reference for every nested operation.
#[derive(Clone, Debug, Deserialize)]
pub struct CreatedId {
    /// The remote-assigned identifier.
    pub id: String,
}

/// Response to a finish or post-log request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FinishResponse {
    /// Optional confirmation message from the backend.
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_escalation_is_monotonic() {
        let mut status = TestStatus::Passed;
        status.escalate(TestStatus::Passed);
        assert_eq!(status, TestStatus::Passed);

        status.escalate(TestStatus::Failed);
        assert_eq!(status, TestStatus::Failed);

        // A later passing unit must not clear the failure.
        status.escalate(TestStatus::Passed);
        assert_eq!(status, TestStatus::Failed);
    }

    #[test]
    fn issue_classification_follows_status() {
        assert_eq!(Issue::for_status(TestStatus::Failed).issue_type, "ti001");
        assert_eq!(Issue::for_status(TestStatus::Passed).issue_type, "nd001");
        assert!(Issue::for_status(TestStatus::Failed).ignore_analyzer);
    }

    #[test]
    fn finish_item_body_shape() {
        let body = serde_json::to_value(FinishItemRequest::new(TestStatus::Failed))
            .expect("body serializes");
        assert_eq!(body["status"], "failed");
        assert_eq!(body["issue"]["issueType"], "ti001");
        assert!(body["endTime"].is_string());
    }

    #[test]
    fn start_item_body_shape() {
        let body = serde_json::to_value(StartItemRequest::new("login", ItemType::Step, "launch-1"))
            .expect("body serializes");
        assert_eq!(body["name"], "login");
        assert_eq!(body["type"], "step");
        assert_eq!(body["launchUuid"], "launch-1");
        assert_eq!(body["hasStats"], false);
        // An unset description is omitted entirely rather than sent as null.
        assert!(body.get("description").is_none());
    }

    #[test]
    fn launch_mode_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(LaunchMode::Debug).expect("mode serializes"),
            serde_json::json!("DEBUG")
        );
    }
}
