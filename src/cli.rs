// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_manifest_path;
use crate::engine::SessionOptions;

/// Command-line arguments for `depbuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "depbuild",
    version,
    about = "Build a module and everything it depends on, in parallel.",
    long_about = None
)]
pub struct CliArgs {
    /// Module to build.
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Path to the module manifest (JSON, or TOML when it ends in `.toml`).
    ///
    /// Default: `depbuild.json` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Number of concurrent builds. Defaults to the host's parallelism.
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Extra arguments appended to the target's own build command.
    #[arg(long, value_name = "STR", default_value = "", allow_hyphen_values = true)]
    pub extra_args: String,

    /// Scheduler and executor tick, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub tick_ms: u64,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEPBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the manifest and print the build order without building.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest.clone().unwrap_or_else(default_manifest_path)
    }

    pub fn session_options(&self) -> SessionOptions {
        let defaults = SessionOptions::default();
        SessionOptions {
            workers: self.workers.unwrap_or(defaults.workers).max(1),
            tick: std::time::Duration::from_millis(self.tick_ms.max(1)),
            extra_args: self.extra_args.clone(),
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_flags_are_omitted() {
        let args = CliArgs::try_parse_from(["depbuild", "app"]).unwrap();
        assert_eq!(args.target, "app");
        assert_eq!(args.manifest_path(), default_manifest_path());
        assert!(!args.dry_run);

        let opts = args.session_options();
        assert!(opts.workers >= 1);
        assert_eq!(opts.tick, std::time::Duration::from_millis(500));
        assert!(opts.extra_args.is_empty());
    }

    #[test]
    fn flags_override_session_options() {
        let args = CliArgs::try_parse_from([
            "depbuild",
            "app",
            "--manifest",
            "mods.toml",
            "-j",
            "3",
            "--extra-args",
            "--prod",
            "--tick-ms",
            "20",
        ])
        .unwrap();

        assert_eq!(args.manifest_path(), PathBuf::from("mods.toml"));
        let opts = args.session_options();
        assert_eq!(opts.workers, 3);
        assert_eq!(opts.tick, std::time::Duration::from_millis(20));
        assert_eq!(opts.extra_args, "--prod");
    }

    #[test]
    fn target_is_required() {
        assert!(CliArgs::try_parse_from(["depbuild"]).is_err());
    }
}
