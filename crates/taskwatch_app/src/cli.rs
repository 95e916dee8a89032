use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use taskwatch_core::TaskStatus;

use crate::config::DEFAULT_CONFIG_FILENAME;
use crate::logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "taskwatch", version, about = "Follow generation task progress in real time")]
pub(crate) struct Cli {
    /// RON config file.
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Bearer token for REST calls.
    #[arg(long, global = true, env = "TASKWATCH_TOKEN", hide_env_values = true)]
    pub(crate) token: Option<String>,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    pub(crate) log_file: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

impl Cli {
    pub(crate) fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME))
    }

    pub(crate) fn log_destination(&self) -> LogDestination {
        match &self.log_file {
            Some(path) => LogDestination::Both(path.clone()),
            None => LogDestination::Terminal,
        }
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Exchange credentials for a token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKWATCH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Attach to an existing task.
    Watch(WatchArgs),
    /// Create a video task and watch it.
    Generate(GenerateArgs),
}

#[derive(Debug, Args)]
pub(crate) struct WatchArgs {
    #[arg(long)]
    pub(crate) task_id: String,

    /// Defaults to the logged-in user.
    #[arg(long)]
    pub(crate) user_id: Option<String>,

    /// Last known progress, 0-100.
    #[arg(long)]
    pub(crate) progress: Option<f64>,

    /// Last known status (pending, processing, paused, completed, failed).
    #[arg(long)]
    pub(crate) status: Option<TaskStatus>,

    /// Seed progress and status from the REST API instead.
    #[arg(long, conflicts_with_all = ["progress", "status"])]
    pub(crate) seed_from_api: bool,
}

#[derive(Debug, Args)]
pub(crate) struct GenerateArgs {
    #[arg(long)]
    pub(crate) character_id: String,

    #[arg(long)]
    pub(crate) script: String,

    /// Seconds.
    #[arg(long, default_value_t = 30)]
    pub(crate) duration: u32,

    #[arg(long, default_value = "realistic")]
    pub(crate) style: String,

    #[arg(long, default_value = "standard")]
    pub(crate) quality: String,

    /// Defaults to the logged-in user.
    #[arg(long)]
    pub(crate) user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn watch_parses_seed_values() {
        let cli = Cli::try_parse_from([
            "taskwatch",
            "watch",
            "--task-id",
            "T1",
            "--user-id",
            "u1",
            "--progress",
            "40",
            "--status",
            "processing",
        ])
        .unwrap();
        let Command::Watch(ref args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.task_id, "T1");
        assert_eq!(args.progress, Some(40.0));
        assert_eq!(args.status, Some(TaskStatus::Processing));
        assert_eq!(cli.config_path(), PathBuf::from(DEFAULT_CONFIG_FILENAME));
    }

    #[test]
    fn seed_from_api_excludes_manual_seed() {
        let parsed = Cli::try_parse_from([
            "taskwatch",
            "watch",
            "--task-id",
            "T1",
            "--progress",
            "10",
            "--seed-from-api",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn generate_applies_request_defaults() {
        let cli = Cli::try_parse_from([
            "taskwatch",
            "generate",
            "--character-id",
            "c1",
            "--script",
            "hi",
        ])
        .unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.duration, 30);
        assert_eq!(args.style, "realistic");
        assert_eq!(args.quality, "standard");
        assert_eq!(args.user_id, None);
    }
}
