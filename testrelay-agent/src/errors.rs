// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the reporting agent.
//!
//! The taxonomy mirrors how failures are handled: [`ConfigError`] is fatal at
//! startup, everything else is recovered at the operation boundary and
//! logged. A reporting failure never terminates the test run.

use camino::Utf8PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A fatal error while loading the run configuration manifest.
///
/// Reporting cannot proceed meaningfully without a complete configuration,
/// so these abort startup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The manifest file could not be read.
    #[error("failed to read manifest at `{path}`")]
    Read {
        /// The manifest path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest was not valid TOML or was missing required keys.
    #[error("failed to parse manifest")]
    Parse(#[source] toml::de::Error),
}

/// An error returned by a reporting operation.
///
/// Ordering errors indicate that the lifecycle was driven out of order, or
/// that an earlier network step failed to produce an identifier. They are
/// returned to the dispatch loop and logged; they never crash the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    /// An operation required the launch identifier before the launch was
    /// started (or its start never produced an identifier).
    #[error("launch id not found: the launch was not started or its creation failed")]
    LaunchIdNotFound,

    /// An operation required the root suite identifier before the root suite
    /// was started.
    #[error("root suite id not found: the root suite was not started or its creation failed")]
    RootSuiteIdNotFound,

    /// An operation required a test suite identifier before any suite was
    /// started.
    #[error("test suite id not found: the suite was not started or its creation failed")]
    SuiteIdNotFound,

    /// A test was finished while no test was in flight.
    #[error("test id not found: no test is in flight")]
    TestIdNotFound,

    /// A raw test identifier could not be normalized into a display name.
    #[error("failed to normalize test name")]
    Normalize(#[from] NormalizeError),
}

/// An error produced by a transport while performing one endpoint request.
///
/// The state machine treats every variant identically: the operation
/// produced no identifier, the failure is logged, and the run continues.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The configured token cannot be carried in an authorization header.
    #[error("invalid authorization token")]
    InvalidToken(#[source] reqwest::header::InvalidHeaderValue),

    /// The HTTP client could not be constructed.
    #[error("failed to construct HTTP client")]
    BuildClient(#[source] reqwest::Error),

    /// The request could not be sent or the connection failed midway.
    #[error("request to `{path}` failed")]
    Request {
        /// Relative path of the endpoint.
        path: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status code.
    #[error("request to `{path}` returned HTTP {status}")]
    Status {
        /// Relative path of the endpoint.
        path: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded as JSON.
    #[error("failed to decode response from `{path}`")]
    Decode {
        /// Relative path of the endpoint.
        path: String,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },

    /// The bounded wait for a response expired.
    #[error("request to `{path}` timed out after {timeout:?}")]
    Timeout {
        /// Relative path of the endpoint.
        path: String,
        /// The configured bound.
        timeout: Duration,
    },
}

/// An error while normalizing a raw test identifier.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum NormalizeError {
    /// A bracketed identifier carried no method name token.
    #[error("test identifier `{raw}` has no method name token")]
    MissingMethodToken {
        /// The raw identifier as delivered by the framework.
        raw: String,
    },

    /// The identifier normalized down to an empty display name.
    #[error("test identifier `{raw}` normalizes to an empty name")]
    EmptyName {
        /// The raw identifier as delivered by the framework.
        raw: String,
    },
}

/// An error while writing to or deleting a capture buffer.
#[derive(Debug, Error)]
#[error("log buffer operation on `{path}` failed")]
pub struct CaptureError {
    /// Path of the buffer file.
    pub path: Utf8PathBuf,
    /// The underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

impl CaptureError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}
