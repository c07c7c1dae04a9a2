//! Background task dispatch.
//!
//! Generation and conversions can run inline or be handed to a
//! [`TaskQueue`]. Tasks cross the queue as JSON payloads, the same shape a
//! persistent queue would store:
//!
//! ```json
//! {"task": "generate_responsive", "media_id": 7, "options": {"formats": ["webp"]}}
//! {"task": "perform_conversions", "media_id": 7, "conversions": ["thumb"], "only_if_missing": true}
//! ```
//!
//! [`WorkerQueue`] runs tasks on one background thread in arrival order,
//! retrying a transiently failed task up to a fixed number of attempts
//! (see [`MediaError::is_transient`]). Delivery is
//! at-least-once: a task that fails after a partial side effect is run
//! again from the start.

use crate::error::MediaError;
use crate::media::MediaId;
use crate::responsive::ResponsiveOptions;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue is closed")]
    Closed,
    #[error("Invalid task payload: {0}")]
    Payload(#[from] serde_json::Error),
}

fn default_only_if_missing() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    GenerateResponsive {
        media_id: MediaId,
        #[serde(default)]
        options: ResponsiveOptions,
    },
    PerformConversions {
        media_id: MediaId,
        conversions: Vec<String>,
        #[serde(default = "default_only_if_missing")]
        only_if_missing: bool,
    },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::GenerateResponsive { .. } => "generate_responsive",
            Task::PerformConversions { .. } => "perform_conversions",
        }
    }

    pub fn media_id(&self) -> MediaId {
        match self {
            Task::GenerateResponsive { media_id, .. } | Task::PerformConversions { media_id, .. } => {
                *media_id
            }
        }
    }

    pub fn to_payload(&self) -> Result<String, QueueError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_payload(payload: &str) -> Result<Self, QueueError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Fire-and-forget submission.
pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, task: Task) -> Result<(), QueueError>;
}

/// Executes a task to completion.
pub trait TaskRunner: Send + Sync {
    fn run(&self, task: &Task) -> Result<(), MediaError>;
}

/// Counters reported when a worker shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u32,
    pub failed: u32,
    pub retries: u32,
}

impl std::fmt::Display for WorkerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} completed, {} failed, {} retries",
            self.completed, self.failed, self.retries
        )
    }
}

/// A queue drained by a single background thread.
pub struct WorkerQueue {
    sender: Mutex<Option<Sender<String>>>,
    handle: Mutex<Option<JoinHandle<WorkerStats>>>,
}

impl WorkerQueue {
    /// Spawn the worker. `max_attempts` is clamped to at least 1.
    pub fn start(runner: Arc<dyn TaskRunner>, max_attempts: u32) -> Self {
        let max_attempts = max_attempts.max(1);
        let (tx, rx) = mpsc::channel::<String>();

        let handle = std::thread::spawn(move || {
            let mut stats = WorkerStats::default();
            for payload in rx {
                let task = match Task::from_payload(&payload) {
                    Ok(task) => task,
                    Err(e) => {
                        tracing::error!(error = %e, "Dropping unreadable task");
                        stats.failed += 1;
                        continue;
                    }
                };
                run_with_retries(runner.as_ref(), &task, max_attempts, &mut stats);
            }
            stats
        });

        Self {
            sender: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop accepting tasks, finish the backlog and return the counters.
    pub fn shutdown(&self) -> WorkerStats {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle.map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                tracing::error!("Queue worker panicked");
                WorkerStats::default()
            }
            None => WorkerStats::default(),
        }
    }
}

impl TaskQueue for WorkerQueue {
    fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        let payload = task.to_payload()?;
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or(QueueError::Closed)?;
        sender.send(payload).map_err(|_| QueueError::Closed)?;
        tracing::debug!(task = task.name(), media_id = %task.media_id(), "Enqueued task");
        Ok(())
    }
}

impl Drop for WorkerQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_with_retries(runner: &dyn TaskRunner, task: &Task, max_attempts: u32, stats: &mut WorkerStats) {
    for attempt in 1..=max_attempts {
        match runner.run(task) {
            Ok(()) => {
                stats.completed += 1;
                return;
            }
            Err(e) if attempt < max_attempts && e.is_transient() => {
                stats.retries += 1;
                tracing::warn!(task = task.name(), media_id = %task.media_id(), attempt, error = %e, "Task failed, retrying");
            }
            Err(e) => {
                stats.failed += 1;
                tracing::error!(task = task.name(), media_id = %task.media_id(), attempt, error = %e, "Task failed, giving up");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ImageFormat;
    use crate::storage::StorageError;
    use std::collections::HashMap;

    /// Fails each media id a configured number of times, then succeeds.
    /// Media 404 always fails with a permanent error.
    struct FlakyRunner {
        failures: Mutex<HashMap<MediaId, u32>>,
        runs: Mutex<Vec<MediaId>>,
    }

    impl FlakyRunner {
        fn new(failures: &[(u64, u32)]) -> Self {
            Self {
                failures: Mutex::new(failures.iter().map(|&(id, n)| (MediaId(id), n)).collect()),
                runs: Mutex::new(Vec::new()),
            }
        }
    }

    impl TaskRunner for FlakyRunner {
        fn run(&self, task: &Task) -> Result<(), MediaError> {
            self.runs.lock().unwrap().push(task.media_id());
            if task.media_id() == MediaId(404) {
                return Err(MediaError::MediaNotFound(task.media_id()));
            }
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&task.media_id()) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    Err(MediaError::Storage(StorageError::Io {
                        path: "original.jpg".into(),
                        source: std::io::Error::other("disk busy"),
                    }))
                }
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn payload_shape() {
        let task = Task::GenerateResponsive {
            media_id: MediaId(7),
            options: ResponsiveOptions::new().with_formats([ImageFormat::Webp]),
        };
        let json: serde_json::Value = serde_json::from_str(&task.to_payload().unwrap()).unwrap();
        assert_eq!(json["task"], "generate_responsive");
        assert_eq!(json["media_id"], 7);
        assert_eq!(json["options"]["formats"][0], "webp");
        assert_eq!(Task::from_payload(&task.to_payload().unwrap()).unwrap(), task);
    }

    #[test]
    fn payload_defaults() {
        let task = Task::from_payload(r#"{"task":"perform_conversions","media_id":3,"conversions":["thumb"]}"#).unwrap();
        assert_eq!(
            task,
            Task::PerformConversions {
                media_id: MediaId(3),
                conversions: vec!["thumb".into()],
                only_if_missing: true,
            }
        );
        let task = Task::from_payload(r#"{"task":"generate_responsive","media_id":1}"#).unwrap();
        assert_eq!(task.name(), "generate_responsive");
    }

    #[test]
    fn worker_runs_tasks_in_order() {
        let runner = Arc::new(FlakyRunner::new(&[]));
        let queue = WorkerQueue::start(runner.clone(), 3);
        for id in 1..=3 {
            queue
                .enqueue(Task::GenerateResponsive {
                    media_id: MediaId(id),
                    options: ResponsiveOptions::default(),
                })
                .unwrap();
        }

        let stats = queue.shutdown();
        assert_eq!(stats, WorkerStats { completed: 3, failed: 0, retries: 0 });
        assert_eq!(*runner.runs.lock().unwrap(), vec![MediaId(1), MediaId(2), MediaId(3)]);
    }

    #[test]
    fn worker_retries_then_gives_up() {
        // id 1 recovers on its second attempt; id 2 never does
        let runner = Arc::new(FlakyRunner::new(&[(1, 1), (2, 10)]));
        let queue = WorkerQueue::start(runner.clone(), 3);
        for id in [1, 2] {
            queue
                .enqueue(Task::PerformConversions {
                    media_id: MediaId(id),
                    conversions: vec!["thumb".into()],
                    only_if_missing: true,
                })
                .unwrap();
        }

        let stats = queue.shutdown();
        assert_eq!(stats, WorkerStats { completed: 1, failed: 1, retries: 3 });
        assert_eq!(runner.runs.lock().unwrap().len(), 5);
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let runner = Arc::new(FlakyRunner::new(&[]));
        let queue = WorkerQueue::start(runner.clone(), 3);
        for id in [404, 5] {
            queue
                .enqueue(Task::GenerateResponsive {
                    media_id: MediaId(id),
                    options: ResponsiveOptions::default(),
                })
                .unwrap();
        }

        let stats = queue.shutdown();
        assert_eq!(stats, WorkerStats { completed: 1, failed: 1, retries: 0 });
        assert_eq!(*runner.runs.lock().unwrap(), vec![MediaId(404), MediaId(5)]);
    }

    #[test]
    fn enqueue_after_shutdown_is_closed() {
        let queue = WorkerQueue::start(Arc::new(FlakyRunner::new(&[])), 1);
        queue.shutdown();
        let result = queue.enqueue(Task::GenerateResponsive {
            media_id: MediaId(1),
            options: ResponsiveOptions::default(),
        });
        assert!(matches!(result, Err(QueueError::Closed)));
    }
}
