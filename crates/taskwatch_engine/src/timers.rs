use std::collections::HashMap;
use std::time::Duration;

use taskwatch_core::{Msg, TimerKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// One abortable tokio task per timer kind. Re-arming replaces the old one.
#[derive(Default)]
pub(crate) struct Timers {
    handles: HashMap<TimerKind, JoinHandle<()>>,
}

impl Timers {
    pub(crate) fn arm(
        &mut self,
        timer: TimerKind,
        delay: Duration,
        periodic: bool,
        msg_tx: mpsc::UnboundedSender<Msg>,
    ) {
        self.cancel(timer);
        // tokio intervals reject a zero period.
        let delay = delay.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            if periodic {
                let mut ticks = interval_at(Instant::now() + delay, delay);
                ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticks.tick().await;
                    if msg_tx.send(timer_message(timer)).is_err() {
                        break;
                    }
                }
            } else {
                tokio::time::sleep(delay).await;
                let _ = msg_tx.send(timer_message(timer));
            }
        });
        self.handles.insert(timer, handle);
    }

    pub(crate) fn cancel(&mut self, timer: TimerKind) {
        if let Some(handle) = self.handles.remove(&timer) {
            handle.abort();
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

fn timer_message(timer: TimerKind) -> Msg {
    match timer {
        TimerKind::Reconnect => Msg::ReconnectDue,
        TimerKind::Heartbeat => Msg::HeartbeatDue,
        TimerKind::Simulation => Msg::SimulationTick {
            sample: rand::random::<f64>(),
        },
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
