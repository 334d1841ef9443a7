use crossbeam::channel::unbounded;
use dashmap::DashMap;
use log::debug;
use std::{sync::Arc, thread};

mod catalog;
mod config;
mod events;
mod rooms;
mod scheduler;
mod util;

pub use catalog::*;
pub use config::*;
pub use events::*;
pub use rooms::*;
pub use scheduler::*;
pub use util::*;

#[cfg(test)]
pub mod test_support;

// Reduces verbosity
type Store<Id, T> = Arc<DashMap<Id, Arc<T>>>;

/// The metronome engine, keeping every room's playback in lock step.
pub struct Metronome {
    context: MetronomeContext,

    pub rooms: RoomManager,
}

/// A type passed to various components of the engine, to access state, reach
/// the catalog, schedule work, and publish events.
#[derive(Clone)]
pub struct MetronomeContext {
    pub(crate) config: Config,

    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) sink: Arc<dyn BroadcastSink>,

    pub(crate) rooms: Store<RoomId, Room>,
    pub(crate) codes: Arc<DashMap<String, RoomId>>,
    pub(crate) memberships: Arc<DashMap<UserId, RoomId>>,
}

impl Metronome {
    /// Creates the engine and starts its task handler.
    ///
    /// Must be called from within a tokio runtime, which the scheduler needs
    /// for its timers.
    pub fn new(config: Config, catalog: Arc<dyn Catalog>, sink: Arc<dyn BroadcastSink>) -> Self {
        let (task_sender, task_receiver) = unbounded();
        let scheduler = Arc::new(TokioScheduler::new(task_sender));

        let context = MetronomeContext {
            config,
            catalog,
            scheduler,
            sink,

            rooms: Default::default(),
            codes: Default::default(),
            memberships: Default::default(),
        };

        spawn_task_handler_thread(&context, task_receiver);

        Self {
            rooms: RoomManager::new(&context),
            context,
        }
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }
}

impl MetronomeContext {
    /// Fans an event out to everyone subscribed to a channel
    pub(crate) fn publish(&self, channel: &ChannelKey, event: &RoomEvent) {
        self.sink.publish(channel, event);
    }
}

/// Scheduled tasks come back on a channel, and this thread drains it.
///
/// Every task is re-checked against current state before it does anything,
/// since the world usually moved on while the timer was sleeping.
fn spawn_task_handler_thread(context: &MetronomeContext, task_receiver: TaskReceiver) {
    let context = context.clone();

    let run = move || {
        let rooms = RoomManager::new(&context);

        while let Ok(task) = task_receiver.recv() {
            match task {
                ScheduledTask::Advance {
                    room_id,
                    generation,
                } => match rooms.room_by_id(room_id) {
                    Ok(room) => room.advance_if_current(generation),
                    // The room dissolved while the timer was sleeping
                    Err(_) => debug!("advance for unregistered room {}, dropping", room_id),
                },
                ScheduledTask::Dissolve { room_id } => rooms.finalize_dissolve(room_id),
            }
        }
    };

    thread::Builder::new()
        .name("metronome-tasks".to_string())
        .spawn(run)
        .expect("task handler thread is spawned");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::RecordingSink;
    use std::time::{Duration, Instant};

    #[tokio::test(flavor = "multi_thread")]
    async fn the_engine_advances_rooms_end_to_end() {
        let catalog = Arc::new(MemoryCatalog::new());
        let sink = Arc::new(RecordingSink::default());
        let metronome = Metronome::new(Config::default(), catalog.clone(), sink.clone());

        let short = catalog.insert(NewTrack::mock("short", 1));
        let long = catalog.insert(NewTrack::mock("long", 600));

        let creator = MemberProfile {
            user_id: 1,
            name: "ada".to_string(),
            avatar_url: None,
        };

        let room = metronome
            .rooms
            .create_room(creator, vec![short.id, long.id])
            .expect("room is created");

        // The first segment is shorter than the safety margin, so its advance
        // is due immediately and only has to make it around the scheduler,
        // the channel and the handler thread
        let deadline = Instant::now() + Duration::from_secs(5);

        while room.state().current_roomtrack.track.title != "long" {
            assert!(
                Instant::now() < deadline,
                "the scheduled advance never came back"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(
            catalog.track(long.id).expect("track exists").play_count,
            1,
            "the advance should count as a play"
        );

        let events = sink.events_for(&ChannelKey::Room(room.id));
        assert!(
            events.iter().any(|e| matches!(
                e,
                RoomEvent::PlaybackSkipped { action_user: None, .. }
            )),
            "a timer driven skip has no acting user"
        );
    }
}
