use std::future::Future;
use std::io::{self, BufRead};
use std::process::ExitCode;

use anyhow::{bail, Context};
use chrono::Local;
use taskwatch_core::{Msg, Session, TaskMount, TaskSeed};
use taskwatch_engine::{ApiClient, ApiError, EngineEvent, EngineHandle, EngineSettings};
use taskwatch_logging::{tw_debug, tw_info, tw_warn};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::render;

/// How a watch session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchOutcome {
    Completed,
    Failed,
    /// Quit or interrupted before the task finished.
    Detached,
}

impl WatchOutcome {
    pub(crate) fn exit_code(self) -> ExitCode {
        match self {
            WatchOutcome::Completed | WatchOutcome::Detached => ExitCode::SUCCESS,
            WatchOutcome::Failed => ExitCode::FAILURE,
        }
    }
}

/// Drives one mounted task until it finishes or the user leaves.
pub(crate) async fn watch_task(
    mount: TaskMount,
    settings: EngineSettings,
) -> anyhow::Result<WatchOutcome> {
    tw_info!("Watching task {} as user {}", mount.task_id, mount.user_id);
    let (handle, events) = EngineHandle::spawn_with_channel(mount, settings)
        .context("invalid progress channel address")?;
    spawn_stdin_commands(handle.sender());
    println!("Commands: p = pause/resume, r = reconnect, q = quit");

    let outcome = follow_events(&handle, events, tokio::signal::ctrl_c()).await;
    handle.join().await;
    Ok(outcome)
}

/// Prints engine events until the driver stops. `interrupt` resolving
/// unmounts the task; it is polled at most once to completion.
async fn follow_events(
    handle: &EngineHandle,
    mut events: UnboundedReceiver<EngineEvent>,
    interrupt: impl Future<Output = io::Result<()>>,
) -> WatchOutcome {
    tokio::pin!(interrupt);
    let mut interrupt_done = false;

    let mut outcome = WatchOutcome::Detached;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(EngineEvent::View(view)) => {
                    println!("{}", render::render_view(&view, Local::now()));
                }
                Some(EngineEvent::Completed(completion)) => {
                    println!("{}", render::render_completion(&completion));
                    outcome = WatchOutcome::Completed;
                    handle.shutdown();
                }
                Some(EngineEvent::Failed { task_id, error }) => {
                    println!("{}", render::render_failure(&task_id, &error));
                    outcome = WatchOutcome::Failed;
                    handle.shutdown();
                }
                None => break,
            },
            signal = &mut interrupt, if !interrupt_done => {
                interrupt_done = true;
                match signal {
                    Ok(()) => {
                        tw_info!("Interrupted; unmounting");
                        handle.shutdown();
                    }
                    Err(err) => tw_warn!("Could not listen for Ctrl-C: {}", err),
                }
            }
        }
    }
    outcome
}

fn spawn_stdin_commands(commands: UnboundedSender<Msg>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let msg = match line.trim() {
                "p" => Msg::PauseToggled,
                "r" => Msg::ConnectRequested,
                "q" => Msg::Unmounted,
                "" => continue,
                other => {
                    eprintln!("Unknown command {other:?} (p, r or q)");
                    continue;
                }
            };
            tw_debug!("stdin command {:?}", msg);
            if commands.send(msg).is_err() {
                break;
            }
        }
    });
}

/// Explicit `--user-id`, else the id of the logged-in user.
pub(crate) async fn resolve_user_id(
    explicit: Option<String>,
    api: &ApiClient,
    session: &mut Session,
) -> anyhow::Result<String> {
    if let Some(user_id) = explicit {
        return Ok(user_id);
    }
    if !session.is_authenticated() {
        bail!("either --user-id or a token (--token / TASKWATCH_TOKEN) is required");
    }
    if let Some(user) = session.user() {
        return Ok(user.id.clone());
    }
    let user = api
        .current_user(session)
        .await
        .map_err(|err| expire_on_unauthorized(session, err))
        .context("failed to look up the current user")?;
    let id = user.id.clone();
    session.set_user(user);
    Ok(id)
}

pub(crate) async fn fetch_seed(
    api: &ApiClient,
    session: &mut Session,
    task_id: &str,
) -> anyhow::Result<TaskSeed> {
    let task = api
        .get_video_task(session, task_id)
        .await
        .map_err(|err| expire_on_unauthorized(session, err))
        .with_context(|| format!("failed to fetch task {task_id}"))?;
    Ok(task.seed())
}

/// A 401 means the token is no longer good; drop it.
pub(crate) fn expire_on_unauthorized(session: &mut Session, err: ApiError) -> ApiError {
    if matches!(err, ApiError::Unauthorized(_)) {
        tw_warn!("Server rejected the token; logging out");
        session.logout();
    }
    err
}
