//! Opaque key/value records and the tagged delta events written to the
//! per-version log. Keys and values are treated as byte-equal identities;
//! row-schema encoding is out of scope for this crate.

use serde::{Deserialize, Serialize};

/// A single key/value pair as stored in a snapshot file or materialized map.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One event in a delta log: either a key was given a new value, or a key
/// was removed. Written in commit order, replayed in file order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum StoreUpdate {
    ValueUpdated { key: Vec<u8>, value: Vec<u8> },
    KeyRemoved { key: Vec<u8> },
}

impl StoreUpdate {
    pub fn key(&self) -> &[u8] {
        match self {
            StoreUpdate::ValueUpdated { key, .. } => key,
            StoreUpdate::KeyRemoved { key } => key,
        }
    }
}
