//! Display-side reconciliation of live tracker state with the offline ramp.

use std::time::Duration;

use taskwatch_logging::{tw_debug, tw_info};

use crate::tracker::clamp_progress;
use crate::{Effect, TaskCompletion, TaskProgress, TaskSeed, TaskStatus, TimerKind};

/// Largest step a single simulation tick may add.
pub const SIMULATION_MAX_STEP: f64 = 5.0;
/// The ramp only advances while progress is below this value.
pub const SIMULATION_CEILING: f64 = 95.0;
/// Hard cap on simulated progress; only a real completion reaches 100.
pub const SIMULATION_CAP: f64 = 99.9;

/// Where the displayed progress value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressSource {
    #[default]
    Seeded,
    Live,
    Simulated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentationAdapter {
    task_id: String,
    progress: f64,
    source: ProgressSource,
    status: TaskStatus,
    paused: bool,
    simulation_interval: Duration,
    simulation_armed: bool,
    completion_fired: bool,
    error_fired: bool,
}

impl PresentationAdapter {
    pub fn new(task_id: impl Into<String>, seed: &TaskSeed, simulation_interval: Duration) -> Self {
        let status = seed.status.unwrap_or_default();
        Self {
            task_id: task_id.into(),
            progress: clamp_progress(seed.progress.unwrap_or(0.0)),
            source: ProgressSource::Seeded,
            status,
            paused: false,
            simulation_interval,
            simulation_armed: false,
            // A task seeded as already finished has nothing left to report.
            completion_fired: status == TaskStatus::Completed,
            error_fired: status == TaskStatus::Failed,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn source(&self) -> ProgressSource {
        self.source
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// True for a local pause and for a task reported as paused.
    pub fn is_paused(&self) -> bool {
        self.paused || self.status == TaskStatus::Paused
    }

    pub fn is_simulating(&self) -> bool {
        self.simulation_armed
    }

    /// Remaining minutes shown to the user; zero unless actively processing.
    pub fn estimated_minutes(&self) -> u32 {
        if self.status == TaskStatus::Processing && !self.paused {
            ((100.0 - self.progress).max(0.0) / 2.0).ceil() as u32
        } else {
            0
        }
    }

    pub fn can_toggle_pause(&self) -> bool {
        matches!(self.status, TaskStatus::Processing | TaskStatus::Paused)
    }

    /// Adopts a live tracker update. While paused only terminal updates are
    /// shown; they also end the pause.
    pub fn apply_live(&mut self, live: &TaskProgress) -> Vec<Effect> {
        if self.paused && !live.status.is_terminal() {
            tw_debug!("Task {} paused; holding live update", self.task_id);
            return Vec::new();
        }
        self.paused = false;
        self.progress = live.progress;
        self.status = live.status;
        self.source = ProgressSource::Live;

        let mut effects = Vec::new();
        if self.status == TaskStatus::Completed && !self.completion_fired {
            self.completion_fired = true;
            effects.push(Effect::NotifyCompleted(TaskCompletion {
                task_id: self.task_id.clone(),
                progress: self.progress,
            }));
        }
        if let Some(error) = live.error.as_deref().filter(|text| !text.is_empty()) {
            if !self.error_fired {
                self.error_fired = true;
                effects.push(Effect::NotifyError {
                    task_id: self.task_id.clone(),
                    error: error.to_string(),
                });
            }
        }
        effects
    }

    /// Advances the offline ramp by `sample * SIMULATION_MAX_STEP`, `sample`
    /// being a uniform draw in `[0, 1)`.
    pub fn simulation_tick(&mut self, sample: f64, connected: bool) -> bool {
        if !self.should_simulate(connected) || self.progress >= SIMULATION_CEILING {
            return false;
        }
        let step = clamp_progress(sample * SIMULATION_MAX_STEP).min(SIMULATION_MAX_STEP);
        let next = (self.progress + step).min(SIMULATION_CAP);
        if next == self.progress {
            return false;
        }
        self.progress = next;
        self.source = ProgressSource::Simulated;
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.status != TaskStatus::Processing || self.paused {
            return false;
        }
        tw_info!("Task {} paused locally", self.task_id);
        self.paused = true;
        self.status = TaskStatus::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if !self.is_paused() {
            return false;
        }
        tw_info!("Task {} resumed locally", self.task_id);
        self.paused = false;
        self.status = TaskStatus::Processing;
        true
    }

    pub fn toggle_pause(&mut self) -> bool {
        if self.is_paused() {
            self.resume()
        } else {
            self.pause()
        }
    }

    /// Resets display state for a new task.
    pub fn reset(&mut self, task_id: impl Into<String>, seed: &TaskSeed) -> Vec<Effect> {
        let effects = self.stop_simulation();
        *self = Self::new(task_id, seed, self.simulation_interval);
        effects
    }

    /// Arms or cancels the ramp timer to match the current conditions.
    pub fn sync_simulation(&mut self, connected: bool) -> Vec<Effect> {
        let wanted = self.should_simulate(connected);
        if wanted == self.simulation_armed {
            return Vec::new();
        }
        if wanted {
            tw_debug!("Task {} offline; starting simulated progress", self.task_id);
            self.simulation_armed = true;
            vec![Effect::ArmTimer {
                timer: TimerKind::Simulation,
                delay: self.simulation_interval,
                periodic: true,
            }]
        } else {
            self.stop_simulation()
        }
    }

    pub fn stop_simulation(&mut self) -> Vec<Effect> {
        if std::mem::take(&mut self.simulation_armed) {
            vec![Effect::CancelTimer {
                timer: TimerKind::Simulation,
            }]
        } else {
            Vec::new()
        }
    }

    fn should_simulate(&self, connected: bool) -> bool {
        !connected && self.status == TaskStatus::Processing && !self.paused
    }
}
