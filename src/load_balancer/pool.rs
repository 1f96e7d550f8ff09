//! Round-robin worker pool.
//!
//! Membership and the rotation cursor are owned by a single task; handles
//! send commands over a bounded channel, so operations on one pool form a
//! linear history without any lock bookkeeping.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::load_balancer::WorkerDescriptor;

const COMMAND_BUFFER: usize = 32;

enum PoolCommand {
    Add(WorkerDescriptor),
    Remove(String),
    Next(oneshot::Sender<Option<Arc<WorkerDescriptor>>>),
}

/// Handle to a per-domain worker pool.
///
/// Cheap to clone; all clones address the same actor task. The task exits
/// once every handle is dropped.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    commands: mpsc::Sender<PoolCommand>,
}

impl WorkerPool {
    /// Create an empty pool and spawn its processing task.
    pub fn spawn() -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(PoolTask::new(rx).run());
        Self { commands }
    }

    /// Append a worker to the rotation.
    pub async fn add(&self, worker: WorkerDescriptor) {
        let _ = self.commands.send(PoolCommand::Add(worker)).await;
    }

    /// Remove every worker registered under `key`.
    pub async fn remove(&self, key: &str) {
        let _ = self.commands.send(PoolCommand::Remove(key.to_string())).await;
    }

    /// Next worker in rotation, or `None` if the pool is empty.
    pub async fn next(&self) -> Option<Arc<WorkerDescriptor>> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(PoolCommand::Next(reply)).await.is_err() {
            return None;
        }
        rx.await.unwrap_or(None)
    }
}

struct PoolTask {
    commands: mpsc::Receiver<PoolCommand>,
    workers: Vec<Arc<WorkerDescriptor>>,
    /// Index of the worker to serve next. `None` iff the pool is empty.
    cursor: Option<usize>,
}

impl PoolTask {
    fn new(commands: mpsc::Receiver<PoolCommand>) -> Self {
        Self {
            commands,
            workers: Vec::new(),
            cursor: None,
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                PoolCommand::Add(worker) => self.add(worker),
                PoolCommand::Remove(key) => self.remove(&key),
                PoolCommand::Next(reply) => {
                    let _ = reply.send(self.next());
                }
            }
        }
    }

    fn add(&mut self, worker: WorkerDescriptor) {
        self.workers.push(Arc::new(worker));
        if self.cursor.is_none() {
            self.cursor = Some(self.workers.len() - 1);
        }
    }

    /// Remove all members matching `key`. Registry paths should be unique,
    /// so multiple matches indicate a registry inconsistency; they are all
    /// dropped rather than rejected.
    fn remove(&mut self, key: &str) {
        let mut i = 0;
        while i < self.workers.len() {
            if self.workers[i].key != key {
                i += 1;
                continue;
            }
            self.workers.remove(i);
            match self.cursor {
                // The cursor pointed at the removed member; its successor
                // slid into slot `i`, wrapping to the front at the end.
                Some(c) if c == i => {
                    self.cursor = if self.workers.is_empty() {
                        None
                    } else if i >= self.workers.len() {
                        Some(0)
                    } else {
                        Some(i)
                    };
                }
                Some(c) if c > i => self.cursor = Some(c - 1),
                _ => {}
            }
        }
    }

    fn next(&mut self) -> Option<Arc<WorkerDescriptor>> {
        let cursor = self.cursor?;
        let worker = self.workers[cursor].clone();
        self.cursor = Some((cursor + 1) % self.workers.len());
        Some(worker)
    }
}
