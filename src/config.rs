// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Refresh configuration resolution.
//!
//! Refit layers its refresh settings from three sources: built-in defaults,
//! the process environment, and explicit command-line flags. Each layer only
//! overrides a field when it actually provides a value, and flags always win.
//!
//! The environment is captured exactly once into an [`EnvSnapshot`] at
//! startup. Everything downstream consumes the one immutable
//! [`RefreshConfig`] produced here, so no code path can observe the
//! environment changing mid-run.
//!
//! List-valued settings travel as single colon-separated strings in both the
//! environment and flag layers, mirroring how PATH-style variables work.
//! Empty tokens are silently dropped.

use std::env;

/// Environment variable selecting the target branch.
pub const BRANCH_ENV: &str = "BRANCH";
/// Environment variable toggling the per-check guard override.
pub const ALLOW_DEV_REFRESH_ENV: &str = "ALLOW_DEV_REFRESH";
/// Environment variable listing marker names that block a refresh.
pub const BLOCK_MARKERS_ENV: &str = "BLOCK_MARKERS";
/// Environment variable listing markers of which at least one must exist.
pub const REQUIRE_MARKERS_ENV: &str = "REQUIRE_MARKERS";
/// Environment variable listing path substrings that block a refresh.
pub const BLOCK_PATH_PATTERNS_ENV: &str = "BLOCK_PATH_PATTERNS";
/// Environment variable requiring a substring of the origin remote URL.
pub const REQUIRE_REMOTE_HOST_ENV: &str = "REQUIRE_REMOTE_HOST";
/// Environment variable toggling the pre-refresh stash.
pub const STASH_BEFORE_REFRESH_ENV: &str = "STASH_BEFORE_REFRESH";

/// Built-in default for the target branch.
pub const DEFAULT_BRANCH: &str = "main";
/// Built-in default marker names that block a refresh.
pub const DEFAULT_BLOCK_MARKERS: &[&str] = &[".dev_workspace"];

/// Resolved refresh settings.
///
/// Immutable once resolved; lives for the duration of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Branch the working copy is refreshed to.
    pub branch: String,

    /// Override switch shared by every overridable guard check.
    pub allow_dev_refresh: bool,

    /// Marker names whose presence at the repository root blocks a refresh.
    pub block_markers: Vec<String>,

    /// Marker names of which at least one must exist at the repository root.
    pub require_markers: Vec<String>,

    /// Substrings of the repository root path that block a refresh.
    pub block_path_patterns: Vec<String>,

    /// Substring the origin remote URL must contain, if set.
    pub require_remote_host: Option<String>,

    /// Whether tracked local changes are stashed before the hard reset.
    pub stash_before_refresh: bool,

    /// Service unit stopped before the working copy is mutated.
    pub service: Option<String>,

    /// Skip the interactive confirmation gate.
    pub non_interactive: bool,
}

impl RefreshConfig {
    /// Resolve refresh settings by layering defaults, environment, and flags.
    ///
    /// `manifest_service` supplies the default for the `service` field; the
    /// service unit has no environment layer, only the `--service` flag.
    pub fn resolve(
        manifest_service: Option<&str>,
        env: &EnvSnapshot,
        overrides: &RefreshOverrides,
    ) -> Self {
        let branch = overrides
            .branch
            .clone()
            .or_else(|| env.branch.clone())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

        let allow_dev_refresh = overrides
            .allow_dev_refresh
            .or(env.allow_dev_refresh.as_deref().map(parse_bool_token))
            .unwrap_or(false);

        let block_markers = overrides
            .block_markers
            .as_deref()
            .or(env.block_markers.as_deref())
            .map(parse_list)
            .unwrap_or_else(|| {
                DEFAULT_BLOCK_MARKERS
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            });

        let require_markers = overrides
            .require_markers
            .as_deref()
            .or(env.require_markers.as_deref())
            .map(parse_list)
            .unwrap_or_default();

        let block_path_patterns = overrides
            .block_path_patterns
            .as_deref()
            .or(env.block_path_patterns.as_deref())
            .map(parse_list)
            .unwrap_or_default();

        let require_remote_host = overrides
            .require_remote_host
            .clone()
            .or_else(|| env.require_remote_host.clone())
            .filter(|host| !host.is_empty());

        let stash_before_refresh = overrides
            .stash_before_refresh
            .or(env.stash_before_refresh.as_deref().map(parse_bool_token))
            .unwrap_or(true);

        let service = overrides
            .service
            .clone()
            .or_else(|| manifest_service.map(ToString::to_string))
            .filter(|service| !service.is_empty());

        Self {
            branch,
            allow_dev_refresh,
            block_markers,
            require_markers,
            block_path_patterns,
            require_remote_host,
            stash_before_refresh,
            service,
            non_interactive: overrides.non_interactive,
        }
    }
}

/// One-time capture of the refresh-related environment variables.
///
/// Captured at startup and never refreshed, so the resolved configuration
/// cannot drift mid-run.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct EnvSnapshot {
    pub branch: Option<String>,
    pub allow_dev_refresh: Option<String>,
    pub block_markers: Option<String>,
    pub require_markers: Option<String>,
    pub block_path_patterns: Option<String>,
    pub require_remote_host: Option<String>,
    pub stash_before_refresh: Option<String>,
}

impl EnvSnapshot {
    /// Capture the refresh environment of the current process.
    pub fn capture() -> Self {
        Self {
            branch: env::var(BRANCH_ENV).ok(),
            allow_dev_refresh: env::var(ALLOW_DEV_REFRESH_ENV).ok(),
            block_markers: env::var(BLOCK_MARKERS_ENV).ok(),
            require_markers: env::var(REQUIRE_MARKERS_ENV).ok(),
            block_path_patterns: env::var(BLOCK_PATH_PATTERNS_ENV).ok(),
            require_remote_host: env::var(REQUIRE_REMOTE_HOST_ENV).ok(),
            stash_before_refresh: env::var(STASH_BEFORE_REFRESH_ENV).ok(),
        }
    }
}

/// Explicit invocation-time overrides from command-line flags.
///
/// `None` means the flag was absent, leaving the lower layers in charge.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RefreshOverrides {
    pub branch: Option<String>,
    pub allow_dev_refresh: Option<bool>,
    pub block_markers: Option<String>,
    pub require_markers: Option<String>,
    pub block_path_patterns: Option<String>,
    pub require_remote_host: Option<String>,
    pub stash_before_refresh: Option<bool>,
    pub service: Option<String>,
    pub non_interactive: bool,
}

/// Parse colon-separated list into ordered sequence of non-empty tokens.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(':')
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Interpret environment toggle token as boolean.
fn parse_bool_token(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    #[test]
    fn defaults_alone() {
        let config = RefreshConfig::resolve(
            None,
            &EnvSnapshot::default(),
            &RefreshOverrides::default(),
        );

        assert_eq!(config.branch, "main");
        assert!(!config.allow_dev_refresh);
        assert_eq!(config.block_markers, vec![".dev_workspace".to_string()]);
        assert!(config.require_markers.is_empty());
        assert!(config.block_path_patterns.is_empty());
        assert_eq!(config.require_remote_host, None);
        assert!(config.stash_before_refresh);
        assert_eq!(config.service, None);
        assert!(!config.non_interactive);
    }

    #[sealed_test(env = [
        ("BRANCH", "staging"),
        ("ALLOW_DEV_REFRESH", "1"),
        ("BLOCK_MARKERS", ".dev:.scratch"),
        ("STASH_BEFORE_REFRESH", "0"),
    ])]
    fn environment_overrides_defaults() {
        let config = RefreshConfig::resolve(
            None,
            &EnvSnapshot::capture(),
            &RefreshOverrides::default(),
        );

        assert_eq!(config.branch, "staging");
        assert!(config.allow_dev_refresh);
        assert_eq!(
            config.block_markers,
            vec![".dev".to_string(), ".scratch".to_string()]
        );
        assert!(!config.stash_before_refresh);
    }

    #[sealed_test(env = [
        ("BRANCH", "staging"),
        ("REQUIRE_REMOTE_HOST", "gitlab.example.com"),
        ("STASH_BEFORE_REFRESH", "0"),
    ])]
    fn flags_override_environment() {
        let overrides = RefreshOverrides {
            branch: Some("release".into()),
            require_remote_host: Some("github.com".into()),
            stash_before_refresh: Some(true),
            ..Default::default()
        };
        let config = RefreshConfig::resolve(None, &EnvSnapshot::capture(), &overrides);

        assert_eq!(config.branch, "release");
        assert_eq!(config.require_remote_host, Some("github.com".into()));
        assert!(config.stash_before_refresh);
    }

    #[test]
    fn service_defaults_from_manifest_and_yields_to_flag() {
        let env = EnvSnapshot::default();

        let config =
            RefreshConfig::resolve(Some("app.service"), &env, &RefreshOverrides::default());
        assert_eq!(config.service, Some("app.service".into()));

        let overrides = RefreshOverrides {
            service: Some("canary.service".into()),
            ..Default::default()
        };
        let config = RefreshConfig::resolve(Some("app.service"), &env, &overrides);
        assert_eq!(config.service, Some("canary.service".into()));
    }

    #[test_case(".a:.b:.c", &[".a", ".b", ".c"]; "plain list")]
    #[test_case("::.a::.b::", &[".a", ".b"]; "empty tokens dropped")]
    #[test_case("", &[]; "empty input")]
    #[test_case(":::", &[]; "only delimiters")]
    #[test]
    fn list_parsing(raw: &str, expect: &[&str]) {
        self::assert_eq!(
            parse_list(raw),
            expect.iter().map(ToString::to_string).collect::<Vec<_>>()
        );
    }

    #[test_case("1", true; "one")]
    #[test_case("true", true; "true word")]
    #[test_case("YES", true; "yes upper")]
    #[test_case("on", true; "on word")]
    #[test_case("0", false; "zero")]
    #[test_case("false", false; "false word")]
    #[test_case("", false; "empty")]
    #[test_case("junk", false; "junk")]
    #[test]
    fn bool_tokens(raw: &str, expect: bool) {
        self::assert_eq!(parse_bool_token(raw), expect);
    }

    #[test]
    fn empty_remote_host_treated_as_unset() {
        let overrides = RefreshOverrides {
            require_remote_host: Some(String::new()),
            ..Default::default()
        };
        let config = RefreshConfig::resolve(None, &EnvSnapshot::default(), &overrides);
        assert_eq!(config.require_remote_host, None);
    }
}
