use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;

use crate::{
    ChannelKey, Id, MetronomeContext, RoomEvent, ScheduledTask, Track, TrackId, UserId,
};

use super::{MemberProfile, RoomError, RoomTrackId, RoomTrackPayload, TrackRing};

pub type RoomId = Id<Room>;

/// A listening room: a ring of tracks, a shared playhead, and the members
/// following it.
///
/// Every mutation of the playhead happens under one lock, so members always
/// observe a single consistent timeline. Events are published after the lock
/// is released.
pub struct Room {
    pub id: RoomId,
    pub join_code: String,
    pub created_on: DateTime<Utc>,
    context: MetronomeContext,
    playback: Mutex<PlaybackState>,
    members: Mutex<MemberList>,
    /// The users allowed to join
    access: Mutex<HashSet<UserId>>,
}

/// Everything that has to change together when the playhead moves
struct PlaybackState {
    ring: TrackRing,
    is_paused: bool,
    /// When the current segment started playing, or when it was frozen by a
    /// pause
    play_start_time: DateTime<Utc>,
    /// How much of the current segment is scheduled to play.
    ///
    /// The full track length after a skip, the remainder after a pause.
    duration_to_complete: Duration,
    /// Bumped on every skip and pause. A scheduled advance carries the value
    /// it was minted under and is dropped once they no longer match.
    generation: u64,
}

#[derive(Default)]
struct MemberList {
    members: Vec<Member>,
    /// Set under the lock when the last member leaves, so a racing join
    /// cannot resurrect the room
    dissolved: bool,
}

/// A user currently in a room
#[derive(Debug, Clone)]
pub struct Member {
    pub profile: MemberProfile,
    pub joined_on: DateTime<Utc>,
    /// Refreshed by heartbeats, read by the liveness sweep
    pub last_seen: DateTime<Utc>,
}

/// The public snapshot of a room
#[derive(Debug, Clone, Serialize)]
pub struct RoomStatePayload {
    pub room_id: RoomId,
    pub members_count: usize,
    pub is_paused: bool,
    pub current_roomtrack: RoomTrackPayload,
    pub play_start_time: DateTime<Utc>,
    /// Whole seconds
    pub duration_to_complete: i64,
}

/// Time left of a segment of `span` that started at `started`, as observed at
/// `now`. Negative when the segment should already have ended.
fn remaining(started: DateTime<Utc>, span: Duration, now: DateTime<Utc>) -> Duration {
    span - (now - started)
}

impl Room {
    pub(crate) fn new(context: &MetronomeContext, join_code: String, first_track: Track) -> Self {
        let now = Utc::now();
        let duration = first_track.duration;

        Self {
            id: RoomId::new(),
            join_code,
            created_on: now,
            context: context.clone(),
            playback: Mutex::new(PlaybackState {
                ring: TrackRing::new(first_track),
                is_paused: false,
                play_start_time: now,
                duration_to_complete: duration,
                generation: 0,
            }),
            members: Default::default(),
            access: Default::default(),
        }
    }

    /// Starts the clock on the first track.
    ///
    /// The first entry becomes current the moment the room is born, so it
    /// counts as a play and gets an advance scheduled like any other skip.
    pub(crate) fn start_playback(&self) {
        let mut playback = self.playback.lock();

        let first = playback.ring.current().track.id;
        self.context.catalog.increment_play_count(first);

        playback.generation += 1;
        self.schedule_advance(&playback);
    }

    /// Moves everyone to a specific queue entry
    pub fn skip_to(
        &self,
        target: RoomTrackId,
        action_user: Option<&MemberProfile>,
    ) -> Result<(), RoomError> {
        let event = {
            let mut playback = self.playback.lock();

            if playback.ring.entry(target).is_none() {
                return Err(RoomError::NotFound {
                    resource: "roomtrack",
                    identifier: target.to_string(),
                });
            }

            self.apply_skip(&mut playback, target, None, action_user)
        };

        self.publish_to_room(&event);
        Ok(())
    }

    /// Moves everyone one entry forward along the lap
    pub fn skip_to_next(&self, action_user: Option<&MemberProfile>) {
        let event = {
            let mut playback = self.playback.lock();
            let next = playback.ring.next_from_current();

            self.apply_skip(&mut playback, next, None, action_user)
        };

        self.publish_to_room(&event);
    }

    /// Starts or resumes playback of the current entry.
    ///
    /// Resuming is a skip to the entry the room is already on, spanning only
    /// the remainder that was left when it was paused. Calling this while
    /// already playing restarts the current segment from its beginning.
    pub fn play(&self, action_user: Option<&MemberProfile>) {
        let event = {
            let mut playback = self.playback.lock();
            let current = playback.ring.current_id();
            let remainder = playback.duration_to_complete;

            self.apply_skip(&mut playback, current, Some(remainder), action_user)
        };

        self.publish_to_room(&event);
    }

    /// Freezes playback, remembering how much of the segment is left.
    ///
    /// Pausing while paused does nothing, so the remainder cannot be eroded
    /// by repeated calls. The advance timer that is already out there is not
    /// cancelled, it dies against the generation bump instead.
    pub fn pause(&self, action_user: Option<&MemberProfile>) {
        let event = {
            let mut playback = self.playback.lock();

            if playback.is_paused {
                return;
            }

            let now = Utc::now();
            let mut left = remaining(
                playback.play_start_time,
                playback.duration_to_complete,
                now,
            );

            if left < Duration::zero() {
                warn!(
                    "room {} paused {}s past the end of its segment, an advance was missed",
                    self.id,
                    -left.num_seconds()
                );
                left = Duration::zero();
            }

            playback.is_paused = true;
            playback.play_start_time = now;
            playback.duration_to_complete = left;
            playback.generation += 1;

            RoomEvent::PlaybackPaused {
                action_user: action_user.cloned(),
                room: self.state_with(&playback),
            }
        };

        self.publish_to_room(&event);
    }

    /// Handles a scheduled advance, if it is still the one the room expects.
    ///
    /// Any skip or pause since it was scheduled bumped the generation, which
    /// turns the timer into a no-op instead of a double skip.
    pub(crate) fn advance_if_current(&self, generation: u64) {
        let event = {
            let mut playback = self.playback.lock();

            if playback.generation != generation || playback.is_paused {
                debug!(
                    "room {}: dropping stale advance from generation {} (now at {})",
                    self.id, generation, playback.generation
                );
                return;
            }

            let next = playback.ring.next_from_current();
            self.apply_skip(&mut playback, next, None, None)
        };

        self.publish_to_room(&event);
    }

    /// Appends a track to the end of the lap
    pub fn add_track(
        &self,
        track_id: TrackId,
        action_user: Option<&MemberProfile>,
    ) -> Result<RoomTrackPayload, RoomError> {
        let track = self.context.catalog.track(track_id)?;

        let (event, payload) = {
            let mut playback = self.playback.lock();
            let id = playback.ring.insert_before_current(track);

            let payload = playback
                .ring
                .entry(id)
                .expect("entry was just inserted")
                .payload();

            let event = RoomEvent::TrackAdded {
                action_user: action_user.cloned(),
                roomtrack: payload.clone(),
            };

            (event, payload)
        };

        self.publish_to_room(&event);
        Ok(payload)
    }

    /// Removes a queue entry.
    ///
    /// Unknown ids are an error. Known ids can still be refused when they are
    /// the current or the only entry, which returns false.
    pub fn remove_track(
        &self,
        roomtrack_id: RoomTrackId,
        action_user: Option<&MemberProfile>,
    ) -> Result<bool, RoomError> {
        let event = {
            let mut playback = self.playback.lock();

            let payload = playback
                .ring
                .entry(roomtrack_id)
                .map(|e| e.payload())
                .ok_or(RoomError::NotFound {
                    resource: "roomtrack",
                    identifier: roomtrack_id.to_string(),
                })?;

            if !playback.ring.remove(roomtrack_id) {
                return Ok(false);
            }

            RoomEvent::TrackRemoved {
                action_user: action_user.cloned(),
                roomtrack: payload,
            }
        };

        self.publish_to_room(&event);
        Ok(true)
    }

    /// Returns the room's public state
    pub fn state(&self) -> RoomStatePayload {
        let playback = self.playback.lock();
        self.state_with(&playback)
    }

    /// All queue entries in playback order, starting at the current one
    pub fn queue(&self) -> Vec<RoomTrackPayload> {
        self.playback
            .lock()
            .ring
            .entries()
            .into_iter()
            .map(|e| e.payload())
            .collect()
    }

    pub fn track_count(&self) -> usize {
        self.playback.lock().ring.len()
    }

    /// Registers a member. Fails when the room already dissolved, so a join
    /// racing the last leave cannot resurrect it.
    pub(crate) fn add_member(&self, profile: MemberProfile) -> Result<(), RoomError> {
        let mut members = self.members.lock();

        if members.dissolved {
            return Err(RoomError::NotFound {
                resource: "room",
                identifier: self.id.to_string(),
            });
        }

        let now = Utc::now();

        members.members.push(Member {
            profile,
            joined_on: now,
            last_seen: now,
        });

        Ok(())
    }

    /// Removes a member, reporting whether that emptied the room.
    ///
    /// An emptied room is marked dissolved under the same lock, so exactly
    /// one caller observes true and gets to tear the room down.
    pub(crate) fn remove_member(&self, user_id: UserId) -> Option<(MemberProfile, bool)> {
        let mut members = self.members.lock();

        let index = members
            .members
            .iter()
            .position(|m| m.profile.user_id == user_id)?;

        let member = members.members.remove(index);

        let emptied = members.members.is_empty() && !members.dissolved;
        if emptied {
            members.dissolved = true;
        }

        Some((member.profile, emptied))
    }

    /// Refreshes a member's liveness clock. False when they are not a member.
    pub(crate) fn touch_member(&self, user_id: UserId) -> bool {
        let mut members = self.members.lock();

        match members
            .members
            .iter_mut()
            .find(|m| m.profile.user_id == user_id)
        {
            Some(member) => {
                member.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Members that have not been heard from within `timeout`
    pub(crate) fn stale_member_ids(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<UserId> {
        let deadline = now - timeout;

        self.members
            .lock()
            .members
            .iter()
            .filter(|m| m.last_seen <= deadline)
            .map(|m| m.profile.user_id)
            .collect()
    }

    pub fn members(&self) -> Vec<Member> {
        self.members.lock().members.clone()
    }

    pub fn members_count(&self) -> usize {
        self.members.lock().members.len()
    }

    /// Whether a user is allowed to join
    pub fn can_access(&self, user_id: UserId) -> bool {
        self.access.lock().contains(&user_id)
    }

    pub fn grant_access(&self, user_id: UserId) {
        self.access.lock().insert(user_id);
    }

    pub fn revoke_access(&self, user_id: UserId) {
        self.access.lock().remove(&user_id);
    }

    /// Moves the playhead to `target` and restarts the segment clock.
    ///
    /// `span` overrides the segment length, which is how resuming plays only
    /// the remainder of a track. The target must have been validated under
    /// the same lock.
    fn apply_skip(
        &self,
        playback: &mut PlaybackState,
        target: RoomTrackId,
        span: Option<Duration>,
        action_user: Option<&MemberProfile>,
    ) -> RoomEvent {
        let previous = playback.ring.current_id();
        playback.ring.set_current(target);

        let (track_id, track_duration) = {
            let current = playback.ring.current();
            (current.track.id, current.track.duration)
        };

        // Re-selecting the entry that was already playing, like resuming from
        // a pause, is not another play
        if target != previous {
            self.context.catalog.increment_play_count(track_id);
        }

        playback.is_paused = false;
        playback.play_start_time = Utc::now();
        playback.duration_to_complete = span.unwrap_or(track_duration);
        playback.generation += 1;

        self.schedule_advance(playback);

        RoomEvent::PlaybackSkipped {
            action_user: action_user.cloned(),
            room: self.state_with(playback),
        }
    }

    fn schedule_advance(&self, playback: &PlaybackState) {
        self.context.scheduler.schedule(
            ScheduledTask::Advance {
                room_id: self.id,
                generation: playback.generation,
            },
            self.context
                .config
                .advance_delay(playback.duration_to_complete),
        );
    }

    fn state_with(&self, playback: &PlaybackState) -> RoomStatePayload {
        RoomStatePayload {
            room_id: self.id,
            members_count: self.members_count(),
            is_paused: playback.is_paused,
            current_roomtrack: playback.ring.current().payload(),
            play_start_time: playback.play_start_time,
            duration_to_complete: playback.duration_to_complete.num_seconds(),
        }
    }

    fn publish_to_room(&self, event: &RoomEvent) {
        self.context.publish(&ChannelKey::Room(self.id), event);
    }
}

#[cfg(test)]
impl Room {
    /// Shifts the segment clock into the past, as if `by` had already elapsed
    pub(crate) fn rewind_clock(&self, by: Duration) {
        let mut playback = self.playback.lock();
        playback.play_start_time = playback.play_start_time - by;
    }

    /// Backdates a member's liveness clock
    pub(crate) fn backdate_member(&self, user_id: UserId, by: Duration) {
        let mut members = self.members.lock();

        if let Some(member) = members
            .members
            .iter_mut()
            .find(|m| m.profile.user_id == user_id)
        {
            member.last_seen = member.last_seen - by;
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.playback.lock().generation
    }
}
