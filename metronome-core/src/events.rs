use std::fmt::Display;

use serde::Serialize;

use crate::{MemberProfile, RoomId, RoomStatePayload, RoomTrackPayload, UserId};

/// A named stream listeners can subscribe to.
///
/// Room channels carry everything that happens inside one room, user channels
/// carry events about a single user's own membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    Room(RoomId),
    User(UserId),
}

impl Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Room(id) => write!(f, "room-{}", id),
            Self::User(id) => write!(f, "user-{}", id),
        }
    }
}

/// Events fanned out to subscribed listeners.
///
/// The variant decides the event name on the wire, the fields are the payload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RoomEvent {
    /// The playhead moved to a new queue entry, by hand or by the segment timer
    PlaybackSkipped {
        action_user: Option<MemberProfile>,
        room: RoomStatePayload,
    },
    /// Playback was frozen with some of the current segment left
    PlaybackPaused {
        action_user: Option<MemberProfile>,
        room: RoomStatePayload,
    },
    /// A track was appended to the room's queue
    TrackAdded {
        action_user: Option<MemberProfile>,
        roomtrack: RoomTrackPayload,
    },
    /// A queue entry was removed
    TrackRemoved {
        action_user: Option<MemberProfile>,
        roomtrack: RoomTrackPayload,
    },
    /// A user became a member of the room
    MemberJoined { action_user: MemberProfile },
    /// A member left, was evicted, or switched rooms
    MemberLeft { action_user: MemberProfile },
    /// Sent on a user's own channel when they enter a room
    Joined { room_id: RoomId },
    /// Sent on a user's own channel when their membership ends
    Left { room_id: RoomId },
    /// The room emptied out and is gone
    Dissolved { room_id: RoomId },
}

impl RoomEvent {
    /// The event name transports publish alongside the payload
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PlaybackSkipped { .. } => "update.playback.skipto",
            Self::PlaybackPaused { .. } => "update.playback.pause",
            Self::TrackAdded { .. } => "update.tracks.add",
            Self::TrackRemoved { .. } => "update.tracks.remove",
            Self::MemberJoined { .. } => "update.members.add",
            Self::MemberLeft { .. } => "update.members.remove",
            Self::Joined { .. } => "room.join",
            Self::Left { .. } => "room.leave",
            Self::Dissolved { .. } => "room.dissolve",
        }
    }

    /// The payload as loose json, for transports that ship it as text
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("event serializes")
    }
}

/// Represents a type that can fan out events to everyone subscribed to a
/// channel.
///
/// Rooms publish after releasing their locks, but implementations should still
/// return quickly and never block on slow consumers.
pub trait BroadcastSink: Send + Sync + 'static {
    fn publish(&self, channel: &ChannelKey, event: &RoomEvent);
}

#[cfg(test)]
mod test {
    use super::*;

    fn profile() -> MemberProfile {
        MemberProfile {
            user_id: 7,
            name: "ada".to_string(),
            avatar_url: None,
        }
    }

    #[test]
    fn channel_keys_render_as_channel_names() {
        assert_eq!(ChannelKey::Room(RoomId::from(3)).to_string(), "room-3");
        assert_eq!(ChannelKey::User(9).to_string(), "user-9");
    }

    #[test]
    fn event_types_match_their_wire_names() {
        let event = RoomEvent::Joined {
            room_id: RoomId::from(1),
        };
        assert_eq!(event.event_type(), "room.join");

        let event = RoomEvent::MemberLeft {
            action_user: profile(),
        };
        assert_eq!(event.event_type(), "update.members.remove");
    }

    #[test]
    fn membership_events_carry_only_the_profile() {
        let payload = RoomEvent::MemberJoined {
            action_user: profile(),
        }
        .payload();

        assert_eq!(payload["action_user"]["user_id"], 7);
        assert_eq!(payload["action_user"]["name"], "ada");
        assert!(
            payload.get("room").is_none(),
            "membership events should not embed room state"
        );
    }

    #[test]
    fn user_channel_events_carry_the_room_id() {
        let payload = RoomEvent::Left {
            room_id: RoomId::from(12),
        }
        .payload();

        assert_eq!(payload["room_id"], 12);
    }
}
