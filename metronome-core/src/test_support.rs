//! Shared fixtures for engine tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{
    random_code, BroadcastSink, Catalog, ChannelKey, Config, MemoryCatalog, MetronomeContext,
    NewTrack, Room, RoomEvent, ScheduledTask, Scheduler, Track, TrackId,
};

/// A scheduler that records instead of waiting
#[derive(Default)]
pub struct RecordingScheduler {
    tasks: Mutex<Vec<(ScheduledTask, Duration)>>,
}

impl RecordingScheduler {
    pub fn last(&self) -> Option<(ScheduledTask, Duration)> {
        self.tasks.lock().last().copied()
    }

    pub fn tasks_of_kind<F>(&self, filter: F) -> Vec<ScheduledTask>
    where
        F: Fn(&ScheduledTask) -> bool,
    {
        self.tasks
            .lock()
            .iter()
            .map(|(task, _)| *task)
            .filter(|task| filter(task))
            .collect()
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule(&self, task: ScheduledTask, delay: Duration) {
        self.tasks.lock().push((task, delay));
    }
}

/// A sink that records every published event
#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(ChannelKey, RoomEvent)>>,
}

impl RecordingSink {
    pub fn events_for(&self, channel: &ChannelKey) -> Vec<RoomEvent> {
        self.published
            .lock()
            .iter()
            .filter(|(key, _)| key == channel)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.published.lock().len()
    }
}

impl BroadcastSink for RecordingSink {
    fn publish(&self, channel: &ChannelKey, event: &RoomEvent) {
        self.published.lock().push((*channel, event.clone()));
    }
}

/// Everything a test needs to stand up rooms without a runtime
pub struct TestBed {
    pub context: MetronomeContext,
    pub catalog: Arc<MemoryCatalog>,
    pub scheduler: Arc<RecordingScheduler>,
    pub sink: Arc<RecordingSink>,
}

impl TestBed {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let catalog = Arc::new(MemoryCatalog::new());
        let scheduler = Arc::new(RecordingScheduler::default());
        let sink = Arc::new(RecordingSink::default());

        let context = MetronomeContext {
            config,
            catalog: catalog.clone(),
            scheduler: scheduler.clone(),
            sink: sink.clone(),

            rooms: Default::default(),
            codes: Default::default(),
            memberships: Default::default(),
        };

        Self {
            context,
            catalog,
            scheduler,
            sink,
        }
    }

    /// Registers a track in the catalog
    pub fn track(&self, title: &str, seconds: i64) -> Track {
        self.catalog.insert(NewTrack::mock(title, seconds))
    }

    /// The current play count of a track
    pub fn play_count(&self, track_id: TrackId) -> u64 {
        self.catalog
            .track(track_id)
            .expect("track exists")
            .play_count
    }

    /// Builds a playing room directly, without any membership bookkeeping
    pub fn room(&self, tracks: &[Track]) -> Arc<Room> {
        let mut tracks = tracks.iter();
        let first = tracks.next().expect("at least one track").clone();

        let room = Arc::new(Room::new(&self.context, random_code(6), first));
        room.start_playback();

        for track in tracks {
            room.add_track(track.id, None).expect("track exists");
        }

        room
    }
}
