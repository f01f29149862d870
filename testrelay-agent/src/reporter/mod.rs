// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reporting state machine and the events that drive it.
//!
//! [`ReportingService`] owns the remote hierarchy identifiers and the
//! aggregate statuses for one run; [`LifecycleEvent`] is the serialized
//! message form of the framework callbacks that drive it.

mod events;
mod service;

pub use events::*;
pub use service::*;
