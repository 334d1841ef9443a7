use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::warn;
use serde::Serialize;
use thiserror::Error;

use crate::Id;

pub type TrackId = Id<Track>;

/// How many tracks [MemoryCatalog::browse] returns at most
const BROWSE_LIMIT: usize = 25;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// A track with this id was never registered
    #[error("track:{0} doesn't exist")]
    NotFound(TrackId),
}

/// A single track in the catalog
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artists: String,
    /// Full length of the track
    pub duration: Duration,
    /// How many times this track became the current one in any room
    pub play_count: u64,
    pub playback_url: String,
    pub image_url: Option<String>,
    pub added_on: DateTime<Utc>,
}

/// The fields needed to register a track
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub title: String,
    pub artists: String,
    pub duration: Duration,
    pub playback_url: String,
    pub image_url: Option<String>,
}

/// The public shape of a track, as seen in queue entries and catalog listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPayload {
    pub track_id: TrackId,
    pub title: String,
    pub artists: String,
    /// Whole seconds
    pub duration: i64,
    pub playback_url: String,
    pub image_url: Option<String>,
}

impl Track {
    pub fn payload(&self) -> TrackPayload {
        TrackPayload {
            track_id: self.id,
            title: self.title.clone(),
            artists: self.artists.clone(),
            duration: self.duration.num_seconds(),
            playback_url: self.playback_url.clone(),
            image_url: self.image_url.clone(),
        }
    }
}

/// Represents a type that can resolve tracks for rooms to play.
///
/// Rooms call this while holding their playback lock, so implementations must
/// answer without blocking on I/O or async machinery.
pub trait Catalog: Send + Sync + 'static {
    /// Returns a snapshot of the track with the given id
    fn track(&self, track_id: TrackId) -> Result<Track, CatalogError>;
    /// Bumps the play counter of a track.
    ///
    /// A missing track is logged and skipped, since the play already happened.
    fn increment_play_count(&self, track_id: TrackId);
}

/// A [Catalog] that lives entirely in memory
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tracks: DashMap<TrackId, Track>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new track and returns it
    pub fn insert(&self, new_track: NewTrack) -> Track {
        let track = Track {
            id: TrackId::new(),
            title: new_track.title,
            artists: new_track.artists,
            duration: new_track.duration,
            play_count: 0,
            playback_url: new_track.playback_url,
            image_url: new_track.image_url,
            added_on: Utc::now(),
        };

        self.tracks.insert(track.id, track.clone());
        track
    }

    /// Returns the most played tracks, most recent first among equals
    pub fn browse(&self) -> Vec<Track> {
        let mut tracks: Vec<_> = self.tracks.iter().map(|t| t.clone()).collect();

        tracks.sort_by(|a, b| {
            b.play_count
                .cmp(&a.play_count)
                .then(b.added_on.cmp(&a.added_on))
        });

        tracks.truncate(BROWSE_LIMIT);
        tracks
    }
}

impl Catalog for MemoryCatalog {
    fn track(&self, track_id: TrackId) -> Result<Track, CatalogError> {
        self.tracks
            .get(&track_id)
            .map(|t| t.clone())
            .ok_or(CatalogError::NotFound(track_id))
    }

    fn increment_play_count(&self, track_id: TrackId) {
        match self.tracks.get_mut(&track_id) {
            Some(mut track) => track.play_count += 1,
            None => warn!("play count bump for unknown track {}, skipping", track_id),
        }
    }
}

#[cfg(test)]
impl NewTrack {
    /// Creates a placeholder track for testing
    pub fn mock(title: &str, seconds: i64) -> Self {
        Self {
            title: title.to_string(),
            artists: "Unknown Artist".to_string(),
            duration: Duration::seconds(seconds),
            playback_url: format!("https://media.test/{}.mp3", title),
            image_url: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tracks_resolve_by_id() {
        let catalog = MemoryCatalog::new();
        let track = catalog.insert(NewTrack::mock("one", 120));

        let fetched = catalog.track(track.id).expect("track exists");
        assert_eq!(fetched.title, "one");
        assert_eq!(fetched.duration, Duration::seconds(120));

        let missing = catalog.track(TrackId::none());
        assert!(
            matches!(missing, Err(CatalogError::NotFound(_))),
            "unknown ids should be a not found error"
        );
    }

    #[test]
    fn play_counts_accumulate() {
        let catalog = MemoryCatalog::new();
        let track = catalog.insert(NewTrack::mock("counted", 90));

        catalog.increment_play_count(track.id);
        catalog.increment_play_count(track.id);

        // Bumping a missing track must not panic
        catalog.increment_play_count(TrackId::none());

        let fetched = catalog.track(track.id).expect("track exists");
        assert_eq!(fetched.play_count, 2);
    }

    #[test]
    fn browse_prefers_played_then_recent_tracks() {
        let catalog = MemoryCatalog::new();

        let quiet = catalog.insert(NewTrack::mock("quiet", 60));
        let popular = catalog.insert(NewTrack::mock("popular", 60));
        // Inserted last, so it is the most recent among the unplayed
        let fresh = catalog.insert(NewTrack::mock("fresh", 60));

        catalog.increment_play_count(popular.id);

        let order: Vec<_> = catalog.browse().into_iter().map(|t| t.id).collect();
        assert_eq!(
            order,
            vec![popular.id, fresh.id, quiet.id],
            "plays win, recency breaks ties"
        );
    }

    #[test]
    fn track_payload_uses_whole_seconds() {
        let catalog = MemoryCatalog::new();
        let track = catalog.insert(NewTrack::mock("timed", 185));

        let payload = track.payload();
        assert_eq!(payload.duration, 185);
        assert_eq!(payload.track_id, track.id);
    }
}
