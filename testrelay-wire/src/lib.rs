// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Wire-level data model for the testrelay reporting agent.
//!
//! This crate carries the typed vocabulary shared between the agent and the
//! reporting backend: item types, statuses, launch modes, the request and
//! response bodies for each backend endpoint, and the declarative
//! [`EndpointRequest`] descriptor a transport consumes. It is pure data;
//! no I/O happens here.

mod endpoint;
mod model;

pub use endpoint::*;
pub use model::*;
