//! Per-unit outbound command queue
//!
//! Producers enqueue and wait a bounded time for the unit's channel to
//! write the command. A producer that gives up drops its acknowledgement
//! receiver; the channel then discards the command instead of writing it
//! late. A failed write puts the command back at the front.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, warn};

use smartshelf_common::slots::LoadcellUnit;

use super::command::LoadcellCommand;
use crate::error::{Error, Result};

/// A queued command and its producer's acknowledgement handle
#[derive(Debug)]
pub struct Pending {
    command: LoadcellCommand,
    ack: oneshot::Sender<()>,
}

impl Pending {
    pub fn command(&self) -> &LoadcellCommand {
        &self.command
    }

    /// Report a successful write to the producer
    pub fn complete(self) {
        let _ = self.ack.send(());
    }

    fn abandoned(&self) -> bool {
        self.ack.is_closed()
    }
}

/// FIFO of commands for one unit
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Mutex<VecDeque<Pending>>,
    notify: Notify,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a command and wait up to `wait` for it to be written
    pub async fn submit(&self, command: LoadcellCommand, wait: Duration) -> Result<()> {
        let kind = command.kind();
        let (ack, done) = oneshot::channel();
        self.pending.lock().await.push_back(Pending { command, ack });
        self.notify.notify_one();

        match tokio::time::timeout(wait, done).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::Command(format!("{} dropped before delivery", kind))),
            Err(_) => Err(Error::Timeout(format!("{} not delivered within {:?}", kind, wait))),
        }
    }

    /// Next live command, waiting at most `wait`
    pub async fn next(&self, wait: Duration) -> Option<Pending> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            {
                let mut pending = self.pending.lock().await;
                while let Some(item) = pending.pop_front() {
                    if item.abandoned() {
                        debug!("Discarding abandoned {} command", item.command.kind());
                        continue;
                    }
                    return Some(item);
                }
            }
            if tokio::time::timeout_at(deadline, self.notify.notified()).await.is_err() {
                return None;
            }
        }
    }

    /// Put a command whose write failed back at the head
    pub async fn requeue(&self, item: Pending) {
        self.pending.lock().await.push_front(item);
        self.notify.notify_one();
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Command queues of both loadcell units
#[derive(Debug, Clone)]
pub struct UnitQueues {
    queues: [Arc<CommandQueue>; 2],
    wait: Duration,
}

impl UnitQueues {
    pub fn new(wait: Duration) -> Self {
        Self {
            queues: [Arc::new(CommandQueue::new()), Arc::new(CommandQueue::new())],
            wait,
        }
    }

    pub fn queue(&self, unit: LoadcellUnit) -> Arc<CommandQueue> {
        self.queues[unit.index()].clone()
    }

    /// Send commands to one unit in order, stopping at the first failure
    pub async fn send_all(&self, unit: LoadcellUnit, commands: Vec<LoadcellCommand>) -> Result<()> {
        for command in commands {
            let kind = command.kind();
            if let Err(e) = self.queues[unit.index()].submit(command, self.wait).await {
                warn!("{}: {} command failed: {}", unit, kind, e);
                return Err(e);
            }
            debug!("{}: {} command delivered", unit, kind);
        }
        Ok(())
    }

    /// Send the same command to both units concurrently
    pub async fn broadcast(&self, command: LoadcellCommand) -> Vec<(LoadcellUnit, Result<()>)> {
        let (first, second) = tokio::join!(
            self.send_all(LoadcellUnit::Unit1, vec![command.clone()]),
            self.send_all(LoadcellUnit::Unit2, vec![command]),
        );
        vec![(LoadcellUnit::Unit1, first), (LoadcellUnit::Unit2, second)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartshelf_common::slots::ShelfMode;

    #[tokio::test]
    async fn test_submit_acknowledged_by_consumer() {
        let queue = Arc::new(CommandQueue::new());
        let consumer = queue.clone();
        let handle = tokio::spawn(async move {
            let item = consumer.next(Duration::from_secs(1)).await.unwrap();
            assert_eq!(item.command(), &LoadcellCommand::CommitMode(ShelfMode::Added));
            item.complete();
        });

        queue
            .submit(LoadcellCommand::CommitMode(ShelfMode::Added), Duration::from_secs(1))
            .await
            .unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_timed_out_command_is_discarded() {
        let queue = CommandQueue::new();
        let result = queue
            .submit(LoadcellCommand::CommitMode(ShelfMode::Adding), Duration::from_millis(20))
            .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
        assert_eq!(queue.len().await, 1);
        assert!(queue.next(Duration::from_millis(20)).await.is_none());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_requeue_goes_to_front() {
        let queue = Arc::new(CommandQueue::new());
        let producer = queue.clone();
        tokio::spawn(async move {
            let _ = producer
                .submit(LoadcellCommand::SetUnitWeights(vec![1]), Duration::from_secs(5))
                .await;
        });
        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = producer
                .submit(LoadcellCommand::SetUnitWeights(vec![2]), Duration::from_secs(5))
                .await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let first = queue.next(Duration::from_secs(1)).await.unwrap();
        queue.requeue(first).await;
        let again = queue.next(Duration::from_secs(1)).await.unwrap();
        assert_eq!(again.command(), &LoadcellCommand::SetUnitWeights(vec![1]));
    }

    #[tokio::test]
    async fn test_next_times_out_when_empty() {
        let queue = CommandQueue::new();
        assert!(queue.next(Duration::from_millis(10)).await.is_none());
    }
}
