use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crossbeam::atomic::AtomicCell;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type IdType = u64;
pub static ID_COUNTER: AtomicCell<IdType> = AtomicCell::new(1);

/// A unique identifier for any type.
pub struct Id<T> {
    value: IdType,
    kind: PhantomData<T>,
}

impl<T> Id<T> {
    /// Creates a new id.
    pub fn new() -> Self {
        Self {
            value: ID_COUNTER.fetch_add(1),
            kind: PhantomData,
        }
    }

    /// Returns an empty id.
    pub fn none() -> Self {
        Self {
            value: 0,
            kind: PhantomData,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> From<IdType> for Id<T> {
    fn from(value: IdType) -> Self {
        Self {
            value,
            kind: PhantomData,
        }
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.value)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        IdType::deserialize(deserializer).map(Self::from)
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}
impl<T> Eq for Id<T> {}

/// Generates a shareable room code, like `K7QX2BNF`.
pub fn random_code(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| (rng.sample(Alphanumeric) as char).to_ascii_uppercase())
        .take(length)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    struct Marker;

    #[test]
    fn ids_are_unique_and_ordered() {
        let first: Id<Marker> = Id::new();
        let second: Id<Marker> = Id::new();

        assert_ne!(first, second, "every id should be distinct");
        assert!(
            second.value() > first.value(),
            "the counter should only move forward"
        );
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let id: Id<Marker> = Id::from(42);

        let encoded = serde_json::to_string(&id).expect("id serializes");
        assert_eq!(encoded, "42", "ids should not be wrapped in an object");

        let decoded: Id<Marker> = serde_json::from_str(&encoded).expect("id deserializes");
        assert_eq!(decoded, id);
    }

    #[test]
    fn room_codes_have_the_requested_length() {
        let code = random_code(8);

        assert_eq!(code.len(), 8);
        assert!(
            code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
            "codes should be uppercase alphanumerics, got {}",
            code
        );
    }
}
