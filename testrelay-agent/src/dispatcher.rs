// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridges framework lifecycle callbacks onto the reporting worker.
//!
//! Test frameworks invoke lifecycle callbacks on threads the agent does not
//! control, in an order that must be preserved. [`EventDispatcher`] turns
//! each callback into one [`LifecycleEvent`] and enqueues it; a single
//! dedicated worker thread drains the queue and drives the
//! [`ReportingService`], so the state machine never sees concurrent calls
//! and remote operations happen in exactly the callback order.
//!
//! Every callback returns immediately except [`run_did_finish`], which
//! blocks until the launch has been closed remotely, since otherwise the
//! test process could exit with the launch still open.
//!
//! [`run_did_finish`]: EventDispatcher::run_did_finish

use crate::{
    config::RunConfiguration,
    errors::{ConfigError, ReportError},
    reporter::{LifecycleEvent, ReportingService},
    transport::{HttpTransport, Transport},
};
use camino::Utf8Path;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};
use testrelay_wire::LogLevel;
use tokio::sync::{
    mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    oneshot,
};
use tracing::{debug, error, info, warn};

/// Receives lifecycle callbacks from a test framework and relays them, in
/// order, to the reporting backend.
///
/// Construct one per run, before the first callback. When the configuration
/// disables reporting the dispatcher is inert: one informational notice is
/// logged and every callback is a silent no-op.
pub struct EventDispatcher {
    inner: Option<DispatcherInner>,
}

struct DispatcherInner {
    events: UnboundedSender<LifecycleEvent>,
    group_depth: AtomicUsize,
    worker: thread::JoinHandle<()>,
}

impl EventDispatcher {
    /// Creates a dispatcher from the manifest at `path`.
    ///
    /// A missing or incomplete manifest is fatal: no meaningful run can be
    /// reported without one.
    pub fn from_manifest_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        Ok(Self::new(RunConfiguration::from_manifest_file(path)?))
    }

    /// Creates a dispatcher for an already-resolved configuration, using the
    /// HTTP transport.
    ///
    /// A transport that cannot be constructed (for example an unusable
    /// token) disables reporting with an error log rather than failing the
    /// run: past configuration loading, nothing here may terminate the test
    /// process.
    pub fn new(config: RunConfiguration) -> Self {
        if !config.send_report {
            return Self::disabled();
        }
        match HttpTransport::new(&config) {
            Ok(transport) => Self::with_transport(config, transport),
            Err(err) => {
                error!(%err, "failed to construct reporting transport, reporting disabled");
                Self { inner: None }
            }
        }
    }

    /// Creates a dispatcher with a caller-supplied transport.
    pub fn with_transport<T: Transport>(config: RunConfiguration, transport: T) -> Self {
        if !config.send_report {
            return Self::disabled();
        }
        let (events, queue) = unbounded_channel();
        let service = ReportingService::new(config, transport);
        let worker = thread::spawn(move || worker_main(service, queue));
        Self {
            inner: Some(DispatcherInner {
                events,
                group_depth: AtomicUsize::new(0),
                worker,
            }),
        }
    }

    fn disabled() -> Self {
        info!("reporting is disabled in the manifest, lifecycle events will not be relayed");
        Self { inner: None }
    }

    /// Whether this dispatcher relays events at all.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    fn enqueue(&self, event: LifecycleEvent) {
        if let Some(inner) = &self.inner {
            // Send fails only once the worker is gone; at that point the run
            // is already over and the event has nowhere to go.
            if inner.events.send(event).is_err() {
                debug!("reporting worker has shut down, dropping lifecycle event");
            }
        }
    }

    /// The test run is about to start.
    pub fn run_will_start(&self) {
        self.enqueue(LifecycleEvent::RunStarted);
    }

    /// A group of tests is about to start. The outermost group of the run
    /// becomes the root suite; nested groups become test suites.
    pub fn group_will_start(&self, name: &str) {
        let Some(inner) = &self.inner else { return };
        let depth = inner.group_depth.fetch_add(1, Ordering::SeqCst) + 1;
        let name = name.to_owned();
        self.enqueue(if depth == 1 {
            LifecycleEvent::RootSuiteStarted { name }
        } else {
            LifecycleEvent::SuiteStarted { name }
        });
    }

    /// A test case is about to start.
    pub fn case_will_start(&self, raw_name: &str) {
        self.enqueue(LifecycleEvent::CaseStarted {
            raw_name: raw_name.to_owned(),
        });
    }

    /// A test case recorded a failure.
    pub fn case_failed(&self, raw_name: &str, description: &str, file: Option<&str>, line: u32) {
        self.enqueue(LifecycleEvent::CaseFailed {
            raw_name: raw_name.to_owned(),
            description: description.to_owned(),
            file: file.map(str::to_owned),
            line,
        });
    }

    /// A test case finished, with its pass/fail outcome.
    pub fn case_did_finish(&self, raw_name: &str, passed: bool) {
        self.enqueue(LifecycleEvent::CaseFinished {
            raw_name: raw_name.to_owned(),
            passed,
        });
    }

    /// A group of tests finished.
    pub fn group_did_finish(&self, name: &str) {
        let Some(inner) = &self.inner else { return };
        let depth = inner.group_depth.fetch_sub(1, Ordering::SeqCst);
        if depth == 0 {
            // More finishes than starts; don't let the counter wrap.
            inner.group_depth.store(0, Ordering::SeqCst);
            warn!(group = %name, "unbalanced group finish callback");
            return;
        }
        debug!(group = %name, "group finished");
        self.enqueue(if depth == 1 {
            LifecycleEvent::RootSuiteFinished
        } else {
            LifecycleEvent::SuiteFinished
        });
    }

    /// The test run finished.
    ///
    /// Blocks until the queued finish has been processed and the remote
    /// launch is closed (or the attempt failed and was logged). This is the
    /// only blocking callback.
    pub fn run_did_finish(&self) {
        let Some(inner) = &self.inner else { return };
        let (ack, done) = oneshot::channel();
        if inner.events.send(LifecycleEvent::RunFinished { ack }).is_err() {
            debug!("reporting worker has shut down, nothing to finish");
            return;
        }
        if done.blocking_recv().is_err() {
            warn!("reporting worker exited before acknowledging the run finish");
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            let DispatcherInner { events, worker, .. } = inner;
            // Closing the channel ends the worker loop; joining waits for
            // any operation still in flight (each one is itself bounded).
            drop(events);
            let _ = worker.join();
        }
    }
}

fn worker_main<T: Transport>(
    service: ReportingService<T>,
    queue: UnboundedReceiver<LifecycleEvent>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build reporting runtime, reporting disabled");
            return;
        }
    };
    runtime.block_on(run_loop(service, queue));
}

/// Drains the event queue, one state machine operation per event.
///
/// The loop is a strict FIFO pipeline: each operation is awaited to
/// completion (bounded by the request timeout) before the next event is
/// looked at. Operation failures are logged and never stop the loop.
async fn run_loop<T: Transport>(
    mut service: ReportingService<T>,
    mut queue: UnboundedReceiver<LifecycleEvent>,
) {
    while let Some(event) = queue.recv().await {
        match event {
            LifecycleEvent::RunStarted => {
                log_failure("start launch", service.start_launch().await);
            }
            LifecycleEvent::RootSuiteStarted { name } => {
                log_failure("start root suite", service.start_root_suite(&name).await);
            }
            LifecycleEvent::SuiteStarted { name } => {
                log_failure("start suite", service.start_suite(&name).await);
            }
            LifecycleEvent::CaseStarted { raw_name } => {
                log_failure("start test", service.start_test(&raw_name).await);
            }
            LifecycleEvent::CaseFailed {
                raw_name,
                description,
                file,
                line,
            } => {
                let message = match file {
                    Some(file) => {
                        format!("Test '{raw_name}' failed at {file}:{line}, {description}")
                    }
                    None => format!("Test '{raw_name}' failed on line {line}, {description}"),
                };
                log_failure(
                    "report failure",
                    service.report_log(LogLevel::Error, &message).await,
                );
            }
            LifecycleEvent::CaseFinished { raw_name, passed } => {
                debug!(case = %raw_name, passed, "case finished");
                log_failure("finish test", service.finish_test(passed).await);
            }
            LifecycleEvent::SuiteFinished => {
                log_failure("finish suite", service.finish_suite().await);
            }
            LifecycleEvent::RootSuiteFinished => {
                log_failure("finish root suite", service.finish_root_suite().await);
            }
            LifecycleEvent::RunFinished { ack } => {
                log_failure("finish launch", service.finish_launch().await);
                let _ = ack.send(());
                break;
            }
        }
    }
}

fn log_failure(operation: &str, result: Result<(), ReportError>) {
    if let Err(error) = result {
        warn!(operation, %error, "reporting operation failed");
    }
}
