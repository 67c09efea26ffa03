//! Cooperative single-threaded scheduler.
//!
//! Every cycle runs each registered task once, in registration order, then
//! sleeps. The sleep is short when any task reported [`TaskStatus::Busy`] and
//! long when all were idle. A fatal status ends the loop immediately; tasks
//! later in that cycle do not run.

use crate::config::SchedulerConfig;
use crate::data::PipelineBuffers;
use crate::error::AppResult;
use crate::tasks::{Task, TaskStatus};
use std::thread;
use std::time::Duration;
use tracing::{error, info, trace};

/// Sleep intervals chosen after each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Sleep after a cycle in which some task was busy.
    pub short: Duration,
    /// Sleep after an all-idle cycle.
    pub long: Duration,
}

impl Pacing {
    /// Interval for a cycle with the given business.
    pub fn interval_for(&self, any_busy: bool) -> Duration {
        if any_busy {
            self.short
        } else {
            self.long
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for Pacing {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            short: config.short_sleep,
            long: config.long_sleep,
        }
    }
}

/// Owns the tasks and the buffers they share.
pub struct Scheduler {
    tasks: Vec<Box<dyn Task>>,
    buffers: PipelineBuffers,
    pacing: Pacing,
    cycles: u64,
}

impl Scheduler {
    /// Create a scheduler without tasks.
    pub fn new(buffers: PipelineBuffers, pacing: Pacing) -> Self {
        Self {
            tasks: Vec::new(),
            buffers,
            pacing,
            cycles: 0,
        }
    }

    /// Append a task; tasks run in the order they were added.
    pub fn with_task(mut self, task: Box<dyn Task>) -> Self {
        self.tasks.push(task);
        self
    }

    /// Append a task in place.
    pub fn add_task(&mut self, task: Box<dyn Task>) {
        self.tasks.push(task);
    }

    /// Names of the registered tasks, in run order.
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }

    /// Shared buffers.
    pub fn buffers(&self) -> &PipelineBuffers {
        &self.buffers
    }

    /// Shared buffers, mutably.
    pub fn buffers_mut(&mut self) -> &mut PipelineBuffers {
        &mut self.buffers
    }

    /// Pacing in effect.
    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run every task once and return how long to sleep before the next cycle.
    ///
    /// A fatal task status is returned as an error naming the task.
    pub fn tick(&mut self) -> AppResult<Duration> {
        let mut any_busy = false;

        for task in self.tasks.iter_mut() {
            match task.run(&mut self.buffers) {
                TaskStatus::Idle => {}
                TaskStatus::Busy => any_busy = true,
                TaskStatus::Fatal(e) => {
                    error!(task = task.name(), error = %e, "task failed");
                    return Err(e.in_task(task.name()));
                }
            }
        }

        self.cycles += 1;
        let interval = self.pacing.interval_for(any_busy);
        trace!(cycle = self.cycles, busy = any_busy, sleep = ?interval, "cycle complete");
        Ok(interval)
    }

    /// Cycle until a task fails.
    pub fn run(&mut self) -> AppResult<()> {
        info!(
            tasks = self.tasks.len(),
            short_sleep = ?self.pacing.short,
            long_sleep = ?self.pacing.long,
            "scheduler started"
        );

        loop {
            let interval = self.tick()?;
            thread::sleep(interval);
        }
    }
}
