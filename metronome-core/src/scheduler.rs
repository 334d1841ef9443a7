use std::time::Duration;

use crossbeam::channel::{Receiver, Sender};
use tokio::runtime::Handle;

use crate::RoomId;

pub type TaskSender = Sender<ScheduledTask>;
pub type TaskReceiver = Receiver<ScheduledTask>;

/// Work the engine asked to be reminded about later.
///
/// Tasks are requests, not commands. The handler re-checks the room's state
/// when one arrives, since anything may have happened in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledTask {
    /// Move the room to the next queue entry, if `generation` is still the
    /// playback generation it was scheduled under
    Advance { room_id: RoomId, generation: u64 },
    /// Announce the end of a room that already emptied out
    Dissolve { room_id: RoomId },
}

/// Represents a type that can deliver a task back to the engine after a delay.
///
/// Delivery is at most once, unordered, and without cancellation. Staleness is
/// the receiver's problem.
pub trait Scheduler: Send + Sync + 'static {
    fn schedule(&self, task: ScheduledTask, delay: Duration);
}

/// A [Scheduler] backed by tokio timers
pub struct TokioScheduler {
    handle: Handle,
    sender: TaskSender,
}

impl TokioScheduler {
    /// Creates a scheduler that delivers into `sender`.
    ///
    /// Must be called from within a tokio runtime, because timers are spawned
    /// on the runtime that was current at construction.
    pub fn new(sender: TaskSender) -> Self {
        Self {
            handle: Handle::current(),
            sender,
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: ScheduledTask, delay: Duration) {
        let sender = self.sender.clone();

        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            // The engine may be gone by now, which is fine
            let _ = sender.send(task);
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crossbeam::channel::unbounded;

    #[tokio::test(flavor = "multi_thread")]
    async fn scheduled_tasks_arrive_on_the_channel() {
        let (sender, receiver) = unbounded();
        let scheduler = TokioScheduler::new(sender);

        let task = ScheduledTask::Advance {
            room_id: RoomId::from(1),
            generation: 4,
        };

        scheduler.schedule(task, Duration::from_millis(10));

        let received = receiver
            .recv_timeout(Duration::from_secs(1))
            .expect("task is delivered");

        assert_eq!(received, task, "the task should arrive unchanged");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_delay_tasks_arrive_immediately() {
        let (sender, receiver) = unbounded();
        let scheduler = TokioScheduler::new(sender);

        let task = ScheduledTask::Dissolve {
            room_id: RoomId::from(2),
        };

        scheduler.schedule(task, Duration::ZERO);

        let received = receiver
            .recv_timeout(Duration::from_secs(1))
            .expect("task is delivered");

        assert_eq!(received, task);
    }
}
