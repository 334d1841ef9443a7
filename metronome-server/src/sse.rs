use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use futures_util::Stream;
use metronome_core::{BroadcastSink, ChannelKey, Id, RoomEvent, RoomId};
use parking_lot::Mutex;
use serde::Deserialize;
use std::{
    collections::VecDeque,
    convert::Infallible,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};

use crate::{context::ServerContext, directory::Actor, Router};

type ConnectionId = Id<Connection>;

/// An event as it goes out on the wire
#[derive(Debug, Clone)]
struct OutboundEvent {
    name: &'static str,
    data: String,
}

impl OutboundEvent {
    fn new(event: &RoomEvent) -> Self {
        Self {
            name: event.event_type(),
            data: serde_json::to_string(event).expect("event serializes"),
        }
    }
}

/// Manages server sent event connections and routes room events to the
/// subscribers of each channel
pub struct SseBroadcaster {
    me: Weak<Self>,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    channels: Vec<ChannelKey>,
    pending_messages: Arc<Mutex<VecDeque<OutboundEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

pub(crate) struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<VecDeque<OutboundEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    broadcaster: Weak<SseBroadcaster>,
}

impl SseBroadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    fn connect(&self, channels: Vec<ChannelKey>) -> ConnectionHandle {
        let connection = Connection::new(channels);
        let handle = connection.handle(self.me.clone());

        self.connections.lock().push(connection);
        handle
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.lock().retain(|c| c.id != id)
    }

    #[cfg(test)]
    fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}

impl BroadcastSink for SseBroadcaster {
    fn publish(&self, channel: &ChannelKey, event: &RoomEvent) {
        let outbound = OutboundEvent::new(event);
        let connections = self.connections.lock();

        for connection in connections.iter().filter(|c| c.channels.contains(channel)) {
            connection.send(outbound.clone())
        }
    }
}

impl Connection {
    fn new(channels: Vec<ChannelKey>) -> Self {
        Self {
            id: ConnectionId::new(),
            channels,
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, message: OutboundEvent) {
        self.pending_messages.lock().push_back(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, broadcaster: Weak<SseBroadcaster>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            broadcaster,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_messages = self.pending_messages.lock();

        if let Some(message) = pending_messages.pop_front() {
            return Poll::Ready(Some(Ok(Event::default()
                .event(message.name)
                .data(message.data))));
        }

        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.broadcaster
            .upgrade()
            .expect("broadcaster upgrades")
            .disconnect(self.id)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventsQuery {
    /// Comma separated room ids to listen in on
    rooms: Option<String>,
}

impl EventsQuery {
    fn room_channels(&self) -> impl Iterator<Item = ChannelKey> + '_ {
        self.rooms
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|part| part.trim().parse::<u64>().ok())
            .map(|id| ChannelKey::Room(RoomId::from(id)))
    }
}

#[utoipa::path(
    get,
    path = "/v1/events",
    tag = "events",
    params(
        ("rooms" = Option<String>, Query, description = "Comma separated room ids to listen in on")
    ),
    security(
        ("UserId" = [])
    ),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events for the requested rooms and the user's own channel"
        )
    )
)]
pub(crate) async fn event_stream(
    Actor(profile): Actor,
    State(context): State<ServerContext>,
    Query(query): Query<EventsQuery>,
) -> Sse<ConnectionHandle> {
    let channels: Vec<_> = query
        .room_channels()
        .chain([ChannelKey::User(profile.user_id)])
        .collect();

    Sse::new(context.sse.connect(channels)).keep_alive(KeepAlive::default())
}

pub fn router() -> Router {
    Router::new().route("/", get(event_stream))
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_util::StreamExt;
    use metronome_core::MemberProfile;

    fn room_channel(id: u64) -> ChannelKey {
        ChannelKey::Room(RoomId::from(id))
    }

    fn joined_event() -> RoomEvent {
        RoomEvent::MemberJoined {
            action_user: MemberProfile {
                user_id: 1,
                name: "ada".to_string(),
                avatar_url: None,
            },
        }
    }

    #[tokio::test]
    async fn events_only_reach_subscribed_channels() {
        let broadcaster = SseBroadcaster::new();

        let mut subscribed = broadcaster.connect(vec![room_channel(1)]);
        let elsewhere = broadcaster.connect(vec![room_channel(2)]);

        broadcaster.publish(&room_channel(1), &joined_event());

        let received = subscribed
            .next()
            .await
            .expect("stream stays open")
            .expect("event is infallible");
        assert!(format!("{:?}", received).contains("update.members.add"));

        assert!(
            elsewhere.pending_messages.lock().is_empty(),
            "the other room's subscriber should hear nothing"
        );
    }

    #[tokio::test]
    async fn dropping_a_handle_disconnects_it() {
        let broadcaster = SseBroadcaster::new();

        let handle = broadcaster.connect(vec![room_channel(1)]);
        assert_eq!(broadcaster.connection_count(), 1);

        drop(handle);
        assert_eq!(broadcaster.connection_count(), 0);
    }

    #[tokio::test]
    async fn messages_come_out_in_publish_order() {
        let broadcaster = SseBroadcaster::new();
        let mut handle = broadcaster.connect(vec![room_channel(1), room_channel(2)]);

        broadcaster.publish(&room_channel(1), &joined_event());
        broadcaster.publish(
            &room_channel(2),
            &RoomEvent::Dissolved {
                room_id: RoomId::from(2),
            },
        );

        let first = handle.next().await.expect("first event").expect("infallible");
        let second = handle.next().await.expect("second event").expect("infallible");

        assert!(format!("{:?}", first).contains("update.members.add"));
        assert!(format!("{:?}", second).contains("room.dissolve"));
    }
}
