mod cli;
mod config;
mod logging;
mod render;
mod watch;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use taskwatch_core::{Session, TaskMount, TaskSeed};
use taskwatch_engine::{ApiClient, VideoTaskRequest};
use taskwatch_logging::{tw_error, tw_info};

use crate::cli::{Cli, Command};
use crate::config::ClientConfig;
use crate::watch::{expire_on_unauthorized, WatchOutcome};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::initialize(cli.log_destination(), cli.verbose);

    match run(cli).await {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            tw_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<WatchOutcome> {
    let config = config::load_config(&cli.config_path());
    let api = ApiClient::new(&config.api_settings()).context("invalid api_url in config")?;
    let mut session = cli
        .token
        .as_deref()
        .map(Session::with_token)
        .unwrap_or_default();

    match cli.command {
        Command::Login { email, password } => {
            let token = api
                .login(&mut session, &email, &password)
                .await
                .context("login failed")?;
            let user = match token.user {
                Some(user) => user,
                None => api
                    .current_user(&session)
                    .await
                    .map_err(|err| expire_on_unauthorized(&mut session, err))
                    .context("failed to look up the current user")?,
            };
            println!("Logged in as {} ({})", user.username, user.id);
            println!("export TASKWATCH_TOKEN={}", token.access_token);
            Ok(WatchOutcome::Detached)
        }
        Command::Watch(args) => {
            let user_id = watch::resolve_user_id(args.user_id, &api, &mut session).await?;
            let seed = if args.seed_from_api {
                watch::fetch_seed(&api, &mut session, &args.task_id).await?
            } else {
                TaskSeed {
                    progress: args.progress,
                    status: args.status,
                }
            };
            let mount = task_mount(&config, args.task_id, user_id, seed);
            watch::watch_task(mount, config.engine_settings()).await
        }
        Command::Generate(args) => {
            let user_id = watch::resolve_user_id(args.user_id, &api, &mut session).await?;
            let request = VideoTaskRequest {
                duration: args.duration,
                style: args.style,
                quality: args.quality,
                ..VideoTaskRequest::new(args.character_id, args.script)
            };
            let task = api
                .create_video_task(&session, &request)
                .await
                .map_err(|err| expire_on_unauthorized(&mut session, err))
                .context("failed to create video task")?;
            tw_info!("Created task {} ({})", task.id, task.status);
            println!("Created task {}", task.id);
            let seed = task.seed();
            let mount = task_mount(&config, task.id, user_id, seed);
            watch::watch_task(mount, config.engine_settings()).await
        }
    }
}

fn task_mount(
    config: &ClientConfig,
    task_id: String,
    user_id: String,
    seed: TaskSeed,
) -> TaskMount {
    TaskMount {
        channel_url: config.channel_url.clone(),
        task_id,
        user_id,
        seed,
    }
}
