// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use tokio::sync::oneshot;

/// A lifecycle event, as queued from a framework callback to the reporting
/// worker.
///
/// Events are produced by the
/// [`EventDispatcher`](crate::dispatcher::EventDispatcher) on whatever
/// thread the framework calls back on, and consumed in order by the single
/// reporting worker.
#[derive(Debug)]
pub enum LifecycleEvent {
    /// The test run started.
    RunStarted,

    /// The outermost group of the run started; it becomes the root suite.
    RootSuiteStarted {
        /// Display name of the bundle.
        name: String,
    },

    /// A nested group started; it becomes a test suite.
    SuiteStarted {
        /// Display name of the suite.
        name: String,
    },

    /// A test case started.
    CaseStarted {
        /// The raw framework identifier of the case.
        raw_name: String,
    },

    /// A test case recorded a failure.
    CaseFailed {
        /// The raw framework identifier of the case.
        raw_name: String,
        /// The failure description.
        description: String,
        /// Source file of the failure, when known.
        file: Option<String>,
        /// Source line of the failure.
        line: u32,
    },

    /// A test case finished.
    CaseFinished {
        /// The raw framework identifier of the case.
        raw_name: String,
        /// Whether the case passed.
        passed: bool,
    },

    /// A nested group finished.
    SuiteFinished,

    /// The outermost group finished.
    RootSuiteFinished,

    /// The test run finished.
    ///
    /// Carries the acknowledgement channel the dispatcher blocks on: the
    /// process must not exit before the launch is closed remotely.
    RunFinished {
        /// Signalled once the finish-launch operation has completed.
        ack: oneshot::Sender<()>,
    },
}
