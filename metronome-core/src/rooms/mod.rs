mod ring;
mod room;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    random_code, CatalogError, ChannelKey, MetronomeContext, RoomEvent, ScheduledTask, TrackId,
};

pub use ring::*;
pub use room::*;

/// Identifies a user of the host application. Users live outside the engine,
/// rooms only remember them by id and profile.
pub type UserId = u64;

/// What the engine knows about a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub user_id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    #[error("User is not allowed to join this room")]
    AccessDenied,
    #[error("User is not a member of any room")]
    UserNotInRoom,
    #[error("A room cannot be created without tracks")]
    EmptyTracklist,
}

impl From<CatalogError> for RoomError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::NotFound(id) => Self::NotFound {
                resource: "track",
                identifier: id.to_string(),
            },
        }
    }
}

/// Manages the lifecycle and membership of all rooms
pub struct RoomManager {
    context: MetronomeContext,
}

impl RoomManager {
    pub fn new(context: &MetronomeContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a room around a non-empty list of tracks.
    ///
    /// The first track starts playing on the spot, and the creator becomes
    /// the first member of the room they just made.
    pub fn create_room(
        &self,
        creator: MemberProfile,
        track_ids: Vec<TrackId>,
    ) -> Result<Arc<Room>, RoomError> {
        if track_ids.is_empty() {
            return Err(RoomError::EmptyTracklist);
        }

        // Resolve everything up front so a bad id cannot half-create a room
        let tracks = track_ids
            .iter()
            .map(|id| self.context.catalog.track(*id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tracks = tracks.into_iter();
        let first = tracks.next().expect("tracklist is non-empty");

        let room = Arc::new(Room::new(&self.context, self.unique_join_code(), first));

        room.grant_access(creator.user_id);
        room.start_playback();

        self.context.rooms.insert(room.id, room.clone());
        self.context.codes.insert(room.join_code.clone(), room.id);

        for track in tracks {
            room.add_track(track.id, Some(&creator))?;
        }

        info!("Room {} created with {} tracks", room.id, track_ids.len());

        self.join_room(room.id, creator)?;

        Ok(room)
    }

    pub fn room_by_id(&self, room_id: RoomId) -> Result<Arc<Room>, RoomError> {
        self.context
            .rooms
            .get(&room_id)
            .map(|r| r.clone())
            .ok_or(RoomError::NotFound {
                resource: "room",
                identifier: room_id.to_string(),
            })
    }

    pub fn room_by_code(&self, code: &str) -> Result<Arc<Room>, RoomError> {
        let room_id = self
            .context
            .codes
            .get(code)
            .map(|id| *id)
            .ok_or(RoomError::NotFound {
                resource: "room",
                identifier: code.to_string(),
            })?;

        self.room_by_id(room_id)
    }

    /// All live rooms
    pub fn list_all(&self) -> Vec<Arc<Room>> {
        self.context.rooms.iter().map(|r| r.clone()).collect()
    }

    /// The room a user is currently a member of
    pub fn room_of(&self, user_id: UserId) -> Option<RoomId> {
        self.context.memberships.get(&user_id).map(|id| *id)
    }

    /// Makes a user a member of a room, leaving whatever room they were in.
    ///
    /// Requires access, which the room's creator hands out.
    pub fn join_room(
        &self,
        room_id: RoomId,
        profile: MemberProfile,
    ) -> Result<Arc<Room>, RoomError> {
        let room = self.room_by_id(room_id)?;

        if !room.can_access(profile.user_id) {
            return Err(RoomError::AccessDenied);
        }

        // A user is in at most one room at a time
        self.leave_room(profile.user_id);

        let user_id = profile.user_id;
        room.add_member(profile.clone())?;

        self.context.memberships.insert(user_id, room_id);

        self.context
            .publish(&ChannelKey::User(user_id), &RoomEvent::Joined { room_id });
        self.context.publish(
            &ChannelKey::Room(room_id),
            &RoomEvent::MemberJoined {
                action_user: profile,
            },
        );

        info!("User {} joined room {}", user_id, room_id);

        Ok(room)
    }

    /// Makes a user a member of the room behind a join code.
    ///
    /// Presenting the code is what grants access, so this is how everyone
    /// except the creator gets in for the first time.
    pub fn join_with_code(&self, code: &str, profile: MemberProfile) -> Result<Arc<Room>, RoomError> {
        let room = self.room_by_code(code)?;
        room.grant_access(profile.user_id);

        self.join_room(room.id, profile)
    }

    /// Removes a user from their room, if they are in one.
    ///
    /// Safe to call for users that are not members anywhere, so evictions,
    /// room switches and explicit leaves can race each other. The last member
    /// out triggers the room's dissolution.
    pub fn leave_room(&self, user_id: UserId) {
        let Some((_, room_id)) = self.context.memberships.remove(&user_id) else {
            return;
        };

        let Ok(room) = self.room_by_id(room_id) else {
            return;
        };

        let Some((profile, dissolved)) = room.remove_member(user_id) else {
            return;
        };

        self.context
            .publish(&ChannelKey::User(user_id), &RoomEvent::Left { room_id });
        self.context.publish(
            &ChannelKey::Room(room_id),
            &RoomEvent::MemberLeft {
                action_user: profile,
            },
        );

        info!("User {} left room {}", user_id, room_id);

        if dissolved {
            self.context.rooms.remove(&room_id);
            self.context.codes.remove(&room.join_code);

            info!("Room {} emptied out, dissolving", room_id);

            self.context
                .scheduler
                .schedule(ScheduledTask::Dissolve { room_id }, StdDuration::ZERO);
        }
    }

    /// Handles a user's liveness ping
    pub fn heartbeat(&self, user_id: UserId) -> Result<(), RoomError> {
        let room_id = self.room_of(user_id).ok_or(RoomError::UserNotInRoom)?;

        let room = self
            .room_by_id(room_id)
            .map_err(|_| RoomError::UserNotInRoom)?;

        if room.touch_member(user_id) {
            Ok(())
        } else {
            Err(RoomError::UserNotInRoom)
        }
    }

    /// Evicts members that have gone silent, in every room.
    ///
    /// Driven from the outside on an interval. Eviction is a plain leave, so
    /// a room whose members all timed out dissolves like any other.
    pub fn check_rooms(&self) {
        let now = Utc::now();
        let timeout = self.context.config.liveness_timeout;

        for room in self.list_all() {
            for user_id in room.stale_member_ids(now, timeout) {
                info!("Evicting silent user {} from room {}", user_id, room.id);
                self.leave_room(user_id);
            }
        }
    }

    /// Handles the scheduled teardown of a room that already emptied.
    ///
    /// The room was unregistered the moment its last member left. This runs
    /// after the scheduler round-trip so transports hear about the dead
    /// channel last, after all membership events.
    pub(crate) fn finalize_dissolve(&self, room_id: RoomId) {
        self.context
            .publish(&ChannelKey::Room(room_id), &RoomEvent::Dissolved { room_id });

        debug!("Room {} dissolved", room_id);
    }

    fn unique_join_code(&self) -> String {
        loop {
            let code = random_code(self.context.config.join_code_length);

            if !self.context.codes.contains_key(&code) {
                return code;
            }
        }
    }
}
