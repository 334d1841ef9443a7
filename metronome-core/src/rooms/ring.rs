use std::collections::HashMap;

use serde::Serialize;

use crate::{Id, Track, TrackPayload};

pub type RoomTrackId = Id<RingEntry>;

/// One slot in a room's queue, pinning a snapshot of a catalog track
#[derive(Debug)]
pub struct RingEntry {
    pub id: RoomTrackId,
    pub track: Track,
    next: RoomTrackId,
    prev: RoomTrackId,
}

/// The public shape of a queue entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomTrackPayload {
    pub roomtrack_id: RoomTrackId,
    #[serde(flatten)]
    pub track: TrackPayload,
}

impl RingEntry {
    pub fn payload(&self) -> RoomTrackPayload {
        RoomTrackPayload {
            roomtrack_id: self.id,
            track: self.track.payload(),
        }
    }

    /// The entry the playhead lands on after this one
    pub fn next_id(&self) -> RoomTrackId {
        self.next
    }
}

/// A room's queue: entries chained into a loop the playhead walks forever.
///
/// Entries live in an id-addressed arena and point at their neighbours by id,
/// never by reference. A dangling link is a bug in the ring itself and panics
/// rather than playing the wrong thing quietly.
///
/// The ring is born with one entry and refuses to drop below one, so there is
/// always something to play.
#[derive(Debug)]
pub struct TrackRing {
    entries: HashMap<RoomTrackId, RingEntry>,
    current: RoomTrackId,
}

impl TrackRing {
    /// Creates a ring containing a single entry looping onto itself
    pub fn new(first: Track) -> Self {
        let id = RoomTrackId::new();
        let entry = RingEntry {
            id,
            track: first,
            next: id,
            prev: id,
        };

        Self {
            entries: HashMap::from([(id, entry)]),
            current: id,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_id(&self) -> RoomTrackId {
        self.current
    }

    pub fn current(&self) -> &RingEntry {
        self.entries
            .get(&self.current)
            .expect("current always resolves")
    }

    /// Moves the playhead. The entry must exist in this ring.
    pub fn set_current(&mut self, id: RoomTrackId) {
        assert!(
            self.entries.contains_key(&id),
            "current must point at a live entry"
        );

        self.current = id;
    }

    /// Where the playhead goes when the current entry finishes.
    ///
    /// In a ring of one this is the current entry itself.
    pub fn next_from_current(&self) -> RoomTrackId {
        self.current().next
    }

    pub fn entry(&self, id: RoomTrackId) -> Option<&RingEntry> {
        self.entries.get(&id)
    }

    /// The entry `offset` hops ahead of the playhead, wrapping around
    pub fn entry_at(&self, offset: usize) -> &RingEntry {
        let mut id = self.current;

        for _ in 0..offset {
            id = self.entries.get(&id).expect("ring links resolve").next;
        }

        self.entries.get(&id).expect("ring links resolve")
    }

    /// All entries in playback order, starting at the current one
    pub fn entries(&self) -> Vec<&RingEntry> {
        let mut result = Vec::with_capacity(self.len());
        let mut id = self.current;

        for _ in 0..self.len() {
            let entry = self.entries.get(&id).expect("ring links resolve");
            result.push(entry);
            id = entry.next;
        }

        result
    }

    /// Splices a new entry in just before the current one, which makes it the
    /// last stop of a full lap. Returns the new entry's id.
    pub fn insert_before_current(&mut self, track: Track) -> RoomTrackId {
        let id = RoomTrackId::new();
        let current = self.current;
        let last = self.current().prev;

        self.entries.insert(
            id,
            RingEntry {
                id,
                track,
                next: current,
                prev: last,
            },
        );

        // In a ring of one, `last` and `current` are the same entry and both
        // updates land on it
        self.entries.get_mut(&last).expect("ring links resolve").next = id;
        self.entries
            .get_mut(&current)
            .expect("ring links resolve")
            .prev = id;

        id
    }

    /// Unsplices an entry. Refuses the current entry, the sole entry, and ids
    /// that are not in the ring, returning false for all three.
    pub fn remove(&mut self, id: RoomTrackId) -> bool {
        if id == self.current || self.len() <= 1 || !self.entries.contains_key(&id) {
            return false;
        }

        let entry = self.entries.remove(&id).expect("presence was just checked");

        self.entries
            .get_mut(&entry.prev)
            .expect("ring links resolve")
            .next = entry.next;
        self.entries
            .get_mut(&entry.next)
            .expect("ring links resolve")
            .prev = entry.prev;

        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{MemoryCatalog, NewTrack};

    fn track(title: &str) -> Track {
        MemoryCatalog::new().insert(NewTrack::mock(title, 100))
    }

    fn titles(ring: &TrackRing) -> Vec<String> {
        ring.entries()
            .into_iter()
            .map(|e| e.track.title.clone())
            .collect()
    }

    #[test]
    fn a_new_ring_loops_onto_itself() {
        let ring = TrackRing::new(track("only"));

        assert_eq!(ring.len(), 1);
        assert_eq!(
            ring.next_from_current(),
            ring.current_id(),
            "the sole entry should be its own successor"
        );
    }

    #[test]
    fn inserting_into_a_ring_of_one_forms_a_two_cycle() {
        let mut ring = TrackRing::new(track("first"));
        let second = ring.insert_before_current(track("second"));

        assert_eq!(ring.len(), 2);
        assert_eq!(ring.next_from_current(), second);
        assert_eq!(
            ring.entry(second).expect("entry exists").next_id(),
            ring.current_id(),
            "both entries should point at each other"
        );
    }

    #[test]
    fn inserts_land_at_the_end_of_the_lap() {
        let mut ring = TrackRing::new(track("a"));
        ring.insert_before_current(track("b"));
        ring.insert_before_current(track("c"));
        ring.insert_before_current(track("d"));

        assert_eq!(titles(&ring), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn entry_at_walks_forward_and_wraps() {
        let mut ring = TrackRing::new(track("a"));
        ring.insert_before_current(track("b"));
        ring.insert_before_current(track("c"));

        assert_eq!(ring.entry_at(0).track.title, "a");
        assert_eq!(ring.entry_at(1).track.title, "b");
        assert_eq!(ring.entry_at(2).track.title, "c");
        assert_eq!(ring.entry_at(3).track.title, "a", "offsets wrap around");
    }

    #[test]
    fn removal_refuses_the_current_and_sole_entry() {
        let mut ring = TrackRing::new(track("a"));

        assert!(!ring.remove(ring.current_id()), "sole entry must stay");

        let b = ring.insert_before_current(track("b"));

        assert!(
            !ring.remove(ring.current_id()),
            "the playing entry must stay"
        );
        assert!(ring.remove(b), "a non-current entry can go");
        assert!(
            !ring.remove(ring.current_id()),
            "back to one entry, which must stay"
        );
    }

    #[test]
    fn removal_of_unknown_ids_is_refused() {
        let mut ring = TrackRing::new(track("a"));
        ring.insert_before_current(track("b"));

        assert!(!ring.remove(RoomTrackId::none()));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn removal_relinks_the_neighbours() {
        let mut ring = TrackRing::new(track("a"));
        let b = ring.insert_before_current(track("b"));
        ring.insert_before_current(track("c"));

        assert!(ring.remove(b));
        assert_eq!(titles(&ring), vec!["a", "c"]);
        assert_eq!(
            ring.entry_at(2).track.title,
            "a",
            "the lap should close cleanly after a removal"
        );
    }

    #[test]
    fn moving_the_playhead_rotates_the_lap() {
        let mut ring = TrackRing::new(track("a"));
        let b = ring.insert_before_current(track("b"));
        ring.insert_before_current(track("c"));

        ring.set_current(b);

        assert_eq!(titles(&ring), vec!["b", "c", "a"]);
    }

    #[test]
    fn a_full_lap_returns_to_the_current_entry() {
        let mut ring = TrackRing::new(track("a"));
        ring.insert_before_current(track("b"));
        let c = ring.insert_before_current(track("c"));
        ring.insert_before_current(track("d"));
        ring.remove(c);

        let mut id = ring.current_id();
        for _ in 0..ring.len() {
            id = ring.entry(id).expect("entry exists").next_id();
        }

        assert_eq!(id, ring.current_id(), "the ring should stay closed");
    }
}
