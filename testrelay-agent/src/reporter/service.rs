// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    capture::LogCapture,
    config::RunConfiguration,
    errors::{ReportError, TransportError},
    normalize::display_name,
    transport::Transport,
};
use serde::de::DeserializeOwned;
use testrelay_wire::{
    CreatedId, EndpointRequest, FinishItemRequest, FinishLaunchRequest, FinishResponse, ItemType,
    LogLevel, PostLogRequest, StartItemRequest, StartLaunchRequest, TestStatus,
};
use tokio::time::timeout;
use tracing::{debug, warn};

/// The reporting state machine for one run.
///
/// Owns the hierarchy identifier set (launch, root suite, suite, current
/// test) and the aggregate statuses. Each operation issues exactly one
/// endpoint request and waits a bounded amount of time for the response, so
/// a child item is never started before its parent's identifier is known.
///
/// Two failure classes are kept strictly apart: a missing parent identifier
/// is an ordering error returned to the caller (and issues no request at
/// all), while a transport failure or timeout is logged and leaves state
/// unchanged; downstream operations then surface the gap as ordering
/// errors instead of hanging the run.
///
/// Callers must serialize operations; the dispatcher's single worker does
/// exactly that.
pub struct ReportingService<T> {
    transport: T,
    config: RunConfiguration,
    capture: LogCapture,
    launch_id: Option<String>,
    root_suite_id: Option<String>,
    test_suite_id: Option<String>,
    current_test_id: Option<String>,
    current_test_name: Option<String>,
    suite_status: TestStatus,
    launch_status: TestStatus,
}

impl<T: Transport> ReportingService<T> {
    /// Creates the state machine for one run.
    pub fn new(config: RunConfiguration, transport: T) -> Self {
        let capture = LogCapture::new(config.log_directory.clone());
        Self {
            transport,
            config,
            capture,
            launch_id: None,
            root_suite_id: None,
            test_suite_id: None,
            current_test_id: None,
            current_test_name: None,
            suite_status: TestStatus::Passed,
            launch_status: TestStatus::Passed,
        }
    }

    /// The aggregate status of the current suite.
    pub fn suite_status(&self) -> TestStatus {
        self.suite_status
    }

    /// The aggregate status of the launch.
    pub fn launch_status(&self) -> TestStatus {
        self.launch_status
    }

    /// Starts the remote launch and captures its identifier.
    ///
    /// On transport failure the launch id stays empty and every downstream
    /// operation fails fast with
    /// [`LaunchIdNotFound`](ReportError::LaunchIdNotFound).
    pub async fn start_launch(&mut self) -> Result<(), ReportError> {
        let request = StartLaunchRequest::new(
            self.config.qualified_launch_name(),
            self.config.tags.clone(),
            self.config.launch_mode,
        );
        if let Some(created) = self
            .call::<CreatedId>(EndpointRequest::start_launch(&request))
            .await
        {
            debug!(launch_id = %created.id, "launch started");
            self.launch_id = Some(created.id);
        }
        Ok(())
    }

    /// Starts the root suite item under the launch.
    pub async fn start_root_suite(&mut self, name: &str) -> Result<(), ReportError> {
        let launch_id = self.launch_id.clone().ok_or(ReportError::LaunchIdNotFound)?;
        let request = StartItemRequest::new(name, ItemType::Suite, launch_id);
        if let Some(created) = self
            .call::<CreatedId>(EndpointRequest::start_item(&request, None))
            .await
        {
            self.root_suite_id = Some(created.id);
        }
        Ok(())
    }

    /// Starts a test suite item under the root suite.
    pub async fn start_suite(&mut self, name: &str) -> Result<(), ReportError> {
        let launch_id = self.launch_id.clone().ok_or(ReportError::LaunchIdNotFound)?;
        let root_suite_id = self
            .root_suite_id
            .clone()
            .ok_or(ReportError::RootSuiteIdNotFound)?;
        let request = StartItemRequest::new(name, ItemType::Test, launch_id);
        if let Some(created) = self
            .call::<CreatedId>(EndpointRequest::start_item(&request, Some(&root_suite_id)))
            .await
        {
            self.test_suite_id = Some(created.id);
        }
        Ok(())
    }

    /// Starts a test item under the current suite and opens its log buffer.
    pub async fn start_test(&mut self, raw_name: &str) -> Result<(), ReportError> {
        let launch_id = self.launch_id.clone().ok_or(ReportError::LaunchIdNotFound)?;
        let suite_id = self
            .test_suite_id
            .clone()
            .ok_or(ReportError::SuiteIdNotFound)?;
        let name = display_name(raw_name, self.config.name_rules)?;

        let request = StartItemRequest::new(name.as_str(), ItemType::Step, launch_id);
        if let Some(created) = self
            .call::<CreatedId>(EndpointRequest::start_item(&request, Some(&suite_id)))
            .await
        {
            self.current_test_id = Some(created.id);
        }

        if let Err(error) = self.capture.create(&name) {
            warn!(%error, test = %name, "failed to open log buffer");
        }
        self.current_test_name = Some(name);
        Ok(())
    }

    /// Sends a log entry attached to the current test. Best-effort: failures
    /// are logged and swallowed, and with no test in flight the remote send
    /// is skipped.
    pub async fn report_log(&self, level: LogLevel, message: &str) -> Result<(), ReportError> {
        if let Some(name) = &self.current_test_name {
            if let Err(error) = self.capture.append(name, &format!("[{level}] {message}")) {
                debug!(%error, test = %name, "failed to append to log buffer");
            }
        }

        match &self.current_test_id {
            Some(test_id) => {
                let request = PostLogRequest::new(test_id.clone(), level, message);
                self.call::<FinishResponse>(EndpointRequest::post_log(&request))
                    .await;
            }
            None => debug!("no test in flight, skipping remote log entry"),
        }
        Ok(())
    }

    /// Finishes the current test item.
    ///
    /// The test's own pass/fail outcome escalates the suite and launch
    /// aggregates; the item itself is finished with the test's own status.
    /// The log buffer is flushed to the backend as one info entry and
    /// deleted.
    pub async fn finish_test(&mut self, passed: bool) -> Result<(), ReportError> {
        let status = TestStatus::from_success(passed);
        self.suite_status.escalate(status);
        self.launch_status.escalate(status);

        if let Some(name) = self.current_test_name.take() {
            let content = self.capture.read(&name);
            // Flush is best-effort; shipping the log must not block the finish.
            let _ = self.report_log(LogLevel::Info, &content).await;
            self.capture.delete(&name);
        }

        let test_id = self
            .current_test_id
            .take()
            .ok_or(ReportError::TestIdNotFound)?;
        let request = FinishItemRequest::new(status);
        self.call::<FinishResponse>(EndpointRequest::finish_item(&test_id, &request))
            .await;
        Ok(())
    }

    /// Finishes the current suite item with the suite's aggregate status.
    ///
    /// The suite identifier is cleared for the next suite; the aggregate is
    /// not: a failure anywhere keeps the remainder of the run failed.
    pub async fn finish_suite(&mut self) -> Result<(), ReportError> {
        let suite_id = self
            .test_suite_id
            .take()
            .ok_or(ReportError::SuiteIdNotFound)?;
        let request = FinishItemRequest::new(self.suite_status);
        self.call::<FinishResponse>(EndpointRequest::finish_item(&suite_id, &request))
            .await;
        Ok(())
    }

    /// Finishes the root suite item with the launch's aggregate status.
    pub async fn finish_root_suite(&mut self) -> Result<(), ReportError> {
        let root_suite_id = self
            .root_suite_id
            .take()
            .ok_or(ReportError::RootSuiteIdNotFound)?;
        let request = FinishItemRequest::new(self.launch_status);
        self.call::<FinishResponse>(EndpointRequest::finish_item(&root_suite_id, &request))
            .await;
        Ok(())
    }

    /// Finishes the remote launch with the launch's aggregate status.
    ///
    /// When the configuration defers the finish to a later bundle this is a
    /// no-op: no request is issued and no error is returned.
    pub async fn finish_launch(&mut self) -> Result<(), ReportError> {
        if !self.config.finish_launch {
            debug!("finish deferred to a later bundle, leaving launch open");
            return Ok(());
        }
        let launch_id = self.launch_id.clone().ok_or(ReportError::LaunchIdNotFound)?;
        let request = FinishLaunchRequest::new(self.launch_status);
        self.call::<FinishResponse>(EndpointRequest::finish_launch(&launch_id, &request))
            .await;
        Ok(())
    }

    /// Performs one endpoint request under the configured bound.
    ///
    /// Transport failures, timeouts and undecodable responses all collapse
    /// to `None`: the operation produced nothing, state stays as it was, and
    /// the failure is logged here at the operation boundary.
    async fn call<R: DeserializeOwned>(&self, request: EndpointRequest) -> Option<R> {
        let path = request.relative_path.clone();
        match timeout(self.config.request_timeout, self.transport.send(request)).await {
            Ok(Ok(value)) => match serde_json::from_value(value) {
                Ok(decoded) => Some(decoded),
                Err(error) => {
                    warn!(%path, %error, "failed to decode backend response");
                    None
                }
            },
            Ok(Err(error)) => {
                warn!(%path, %error, "backend request failed");
                None
            }
            Err(_elapsed) => {
                let error = TransportError::Timeout {
                    path: path.clone(),
                    timeout: self.config.request_timeout,
                };
                warn!(%path, %error, "backend request timed out");
                None
            }
        }
    }
}
