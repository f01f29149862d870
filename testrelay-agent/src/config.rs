// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run configuration for the reporting agent.
//!
//! Configuration is loaded exactly once, before the first lifecycle event,
//! from a TOML manifest. The resolved [`RunConfiguration`] is an immutable
//! value passed into the dispatcher at construction; no component reads
//! ambient process state after this point. Missing required keys are a fatal
//! startup error, since a run without a backend URL or token cannot report
//! anything meaningful.

use crate::errors::ConfigError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::{env, fmt, str::FromStr, time::Duration};
use testrelay_wire::LaunchMode;

/// Environment variable naming the test-type label attached to launches.
pub const TEST_TYPE_VAR: &str = "TESTRELAY_TEST_TYPE";

/// Environment variable naming the test-priority label attached to launches.
pub const TEST_PRIORITY_VAR: &str = "TESTRELAY_TEST_PRIORITY";

/// The raw manifest as written by the user.
///
/// Field requiredness matches what a meaningful run needs: everything
/// without a `serde` default must be present or parsing fails.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Manifest {
    send_report: bool,
    portal_url: String,
    project: String,
    token: String,
    finish_launch: bool,
    launch_name: String,
    log_directory: Utf8PathBuf,
    environment: String,
    build_version: String,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    debug_mode: bool,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    request_timeout: Duration,
    #[serde(default)]
    name_rules: NameRuleSet,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

/// Which normalization rules apply to raw test names.
///
/// All rules default to off; the manifest enables them individually under
/// the `[name-rules]` table.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct NameRuleSet {
    /// Strip the conventional `test` prefix from the method name.
    pub strip_test_prefix: bool,
    /// Replace underscores with spaces.
    pub whitespace_on_underscore: bool,
    /// Insert a space at each camel-case boundary.
    pub whitespace_on_camel_case: bool,
}

/// The kind of test run, attached to the launch as a tag.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TestType {
    /// An end-to-end test run.
    E2eTest,
    /// A UI test run.
    #[default]
    UiTest,
}

impl FromStr for TestType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "e2e-test" => Ok(Self::E2eTest),
            "ui-test" => Ok(Self::UiTest),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::E2eTest => write!(f, "e2e-test"),
            Self::UiTest => write!(f, "ui-test"),
        }
    }
}

/// The priority bucket of a test run, attached to the launch as a tag.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TestPriority {
    /// Smoke tests.
    Smoke,
    /// Minimal acceptance tests.
    Mat,
    /// The full regression bucket.
    #[default]
    Regression,
}

impl FromStr for TestPriority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smoke" => Ok(Self::Smoke),
            "mat" => Ok(Self::Mat),
            "regression" => Ok(Self::Regression),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TestPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smoke => write!(f, "smoke"),
            Self::Mat => write!(f, "mat"),
            Self::Regression => write!(f, "regression"),
        }
    }
}

/// Run metadata sourced from the process environment at load time.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunEnvironment {
    /// The test-type label.
    pub test_type: TestType,
    /// The test-priority label.
    pub test_priority: TestPriority,
}

impl RunEnvironment {
    /// Captures the run environment from process environment variables.
    ///
    /// Unset or unrecognized values fall back to the defaults, matching how
    /// an unconfigured CI job should still report something sensible.
    pub fn capture() -> Self {
        Self {
            test_type: parse_var(TEST_TYPE_VAR),
            test_priority: parse_var(TEST_PRIORITY_VAR),
        }
    }
}

fn parse_var<T: FromStr + Default>(name: &str) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or_default()
}

/// The immutable configuration for one reporting run.
///
/// Constructed before the first lifecycle event and never mutated.
#[derive(Clone, Debug)]
pub struct RunConfiguration {
    /// Whether to report this run at all. When false every lifecycle
    /// callback is a no-op.
    pub send_report: bool,
    /// Base URL of the reporting backend.
    pub portal_url: String,
    /// Project name on the backend; joined onto the base URL.
    pub project: String,
    /// Authorization token, sent as a bearer header.
    pub token: String,
    /// Whether this bundle should close the launch when it finishes.
    /// Multi-bundle runs set this on the final bundle only.
    pub finish_launch: bool,
    /// The configured launch name.
    pub launch_name: String,
    /// Directory holding per-test capture buffers.
    pub log_directory: Utf8PathBuf,
    /// Environment name woven into the qualified launch name.
    pub environment: String,
    /// Build version woven into the qualified launch name and tags.
    pub build_version: String,
    /// The test-type label.
    pub test_type: TestType,
    /// The test-priority label.
    pub test_priority: TestPriority,
    /// The launch's full tag set: configured tags plus derived metadata.
    pub tags: Vec<String>,
    /// The launch mode.
    pub launch_mode: LaunchMode,
    /// Bound on the wait for each backend response.
    pub request_timeout: Duration,
    /// Normalization rules for raw test names.
    pub name_rules: NameRuleSet,
}

impl RunConfiguration {
    /// Loads and resolves the manifest at `path`.
    pub fn from_manifest_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_manifest_str(&text)
    }

    /// Resolves a manifest from its TOML text, capturing run metadata from
    /// the process environment.
    pub fn from_manifest_str(text: &str) -> Result<Self, ConfigError> {
        let manifest: Manifest = toml::from_str(text).map_err(ConfigError::Parse)?;
        Ok(Self::resolve(manifest, RunEnvironment::capture()))
    }

    fn resolve(manifest: Manifest, run_env: RunEnvironment) -> Self {
        let mut tags: Vec<String> = manifest
            .tags
            .as_deref()
            .map(|raw| {
                raw.trim()
                    .split(',')
                    .map(|tag| tag.trim().to_owned())
                    .filter(|tag| !tag.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        tags.push(run_env.test_type.to_string());
        tags.push(manifest.launch_name.clone());
        tags.push(manifest.build_version.clone());
        tags.push(run_env.test_priority.to_string());

        let launch_mode = if manifest.debug_mode {
            LaunchMode::Debug
        } else {
            LaunchMode::Default
        };

        Self {
            send_report: manifest.send_report,
            portal_url: manifest.portal_url,
            project: manifest.project,
            token: manifest.token,
            finish_launch: manifest.finish_launch,
            launch_name: manifest.launch_name,
            log_directory: manifest.log_directory,
            environment: manifest.environment,
            build_version: manifest.build_version,
            test_type: run_env.test_type,
            test_priority: run_env.test_priority,
            tags,
            launch_mode,
            request_timeout: manifest.request_timeout,
            name_rules: manifest.name_rules,
        }
    }

    /// The launch name as reported to the backend: the configured name
    /// qualified with the test type, environment and build version.
    pub fn qualified_launch_name(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.launch_name, self.test_type, self.environment, self.build_version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const COMPLETE_MANIFEST: &str = indoc! {r#"
        send-report = true
        portal-url = "https://portal.example.com/api/v1"
        project = "mobile"
        token = "secret-token"
        finish-launch = true
        launch-name = "nightly"
        log-directory = "/tmp/testrelay-logs"
        environment = "staging"
        build-version = "2.4.1"
        tags = "ios, smoke "
        debug-mode = true
        request-timeout = "30s"

        [name-rules]
        strip-test-prefix = true
        whitespace-on-underscore = true
    "#};

    fn resolve_str(text: &str, run_env: RunEnvironment) -> RunConfiguration {
        let manifest: Manifest = toml::from_str(text).expect("manifest parses");
        RunConfiguration::resolve(manifest, run_env)
    }

    #[test]
    fn complete_manifest_resolves() {
        let config = resolve_str(
            COMPLETE_MANIFEST,
            RunEnvironment {
                test_type: TestType::E2eTest,
                test_priority: TestPriority::Smoke,
            },
        );
        assert_eq!(config.project, "mobile");
        assert_eq!(config.launch_mode, LaunchMode::Debug);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(
            config.tags,
            vec!["ios", "smoke", "e2e-test", "nightly", "2.4.1", "smoke"]
        );
        assert_eq!(
            config.name_rules,
            NameRuleSet {
                strip_test_prefix: true,
                whitespace_on_underscore: true,
                whitespace_on_camel_case: false,
            }
        );
        assert_eq!(
            config.qualified_launch_name(),
            "nightly_e2e-test_staging_2.4.1"
        );
    }

    #[test]
    fn missing_required_key_is_fatal() {
        // No token.
        let text = indoc! {r#"
            send-report = true
            portal-url = "https://portal.example.com"
            project = "mobile"
            finish-launch = true
            launch-name = "nightly"
            log-directory = "/tmp/logs"
            environment = "staging"
            build-version = "2.4.1"
        "#};
        let error = RunConfiguration::from_manifest_str(text).expect_err("token is required");
        assert!(matches!(error, ConfigError::Parse(_)));
        assert!(error.to_string().contains("parse"));
    }

    #[test]
    fn optional_keys_default() {
        let text = indoc! {r#"
            send-report = false
            portal-url = "https://portal.example.com"
            project = "mobile"
            token = "t"
            finish-launch = false
            launch-name = "pr"
            log-directory = "/tmp/logs"
            environment = "dev"
            build-version = "0.0.1"
        "#};
        let config = resolve_str(text, RunEnvironment::default());
        assert_eq!(config.launch_mode, LaunchMode::Default);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.name_rules, NameRuleSet::default());
        // Derived metadata is still appended when no tags are configured.
        assert_eq!(config.tags, vec!["ui-test", "pr", "0.0.1", "regression"]);
    }

    #[test]
    fn label_round_trips() {
        for test_type in [TestType::E2eTest, TestType::UiTest] {
            assert_eq!(test_type.to_string().parse(), Ok(test_type));
        }
        for priority in [TestPriority::Smoke, TestPriority::Mat, TestPriority::Regression] {
            assert_eq!(priority.to_string().parse(), Ok(priority));
        }
        assert_eq!("anything-else".parse::<TestType>(), Err(()));
    }
}
