//! Periodic autosave and resnapshot timers.
//!
//! Timers never touch the book. Each firing only queues an [`Intent`] for
//! the session controller, which handles it between messages. Timers are
//! armed per session and stop when their [`PeriodicTask`] guard is dropped
//! or the shutdown flag is raised.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::command::Intent;
use crate::persist::SaveCause;

/// Intervals of the two session timers. `None` disables a timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerSettings {
    pub autosave: Option<Duration>,
    pub resnapshot: Option<Duration>,
}

/// A running timer task, aborted on drop.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Queues `intent` every `every`, starting one full interval from now.
///
/// The task ends when the shutdown flag becomes `true` or the intent
/// receiver is dropped.
pub fn spawn_periodic(
    name: &'static str,
    every: Duration,
    intent: Intent,
    tx: mpsc::UnboundedSender<Intent>,
    mut shutdown: watch::Receiver<bool>,
) -> PeriodicTask {
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    debug!(timer = name, "Timer fired");
                    if tx.send(intent).is_err() {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(timer = name, "Timer stopped");
    });

    PeriodicTask { name, handle }
}

/// Timers belonging to one session.
#[derive(Debug, Default)]
pub struct SessionTimers {
    tasks: Vec<PeriodicTask>,
}

impl SessionTimers {
    /// Starts whichever timers `settings` enables.
    pub fn arm(
        settings: TimerSettings,
        tx: &mpsc::UnboundedSender<Intent>,
        shutdown: &watch::Receiver<bool>,
    ) -> Self {
        let mut tasks = Vec::new();

        if let Some(every) = settings.autosave {
            tasks.push(spawn_periodic(
                "autosave",
                every,
                Intent::Save(SaveCause::Autosave),
                tx.clone(),
                shutdown.clone(),
            ));
        }
        if let Some(every) = settings.resnapshot {
            tasks.push(spawn_periodic(
                "resnapshot",
                every,
                Intent::RequestSnapshot,
                tx.clone(),
                shutdown.clone(),
            ));
        }

        Self { tasks }
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(PeriodicTask::name).collect()
    }
}
