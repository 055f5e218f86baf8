//! Entity references: the identifier format, normalisation of loosely typed id
//! lists coming from forms, and read-time population of references.

mod populate;

pub use populate::{
    populate_all, populate_one, Populate, ReferenceLookup, ReferenceSet, Resolved, SongRefs,
    StoreLookup,
};

use crate::error::{ServiceError, ServiceResult};
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref ID_FORMAT: Regex =
        Regex::new("^[0-9a-fA-F]{24}$").expect("Invalid identifier regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Artist,
    Song,
    Album,
    Playlist,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Song => "song",
            EntityKind::Album => "album",
            EntityKind::Playlist => "playlist",
            EntityKind::User => "user",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            EntityKind::Artist => "Artist",
            EntityKind::Song => "Song",
            EntityKind::Album => "Album",
            EntityKind::Playlist => "Playlist",
            EntityKind::User => "User",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `candidate` has the shape of an entity identifier: 24 hex digits.
pub fn is_well_formed_id(candidate: &str) -> bool {
    ID_FORMAT.is_match(candidate)
}

/// A new identifier: creation second (8 hex digits) followed by 16 random hex digits.
pub fn generate_id() -> String {
    let secs = chrono::Utc::now().timestamp() as u32;
    let random: u64 = rand::rng().random();
    format!("{:08x}{:016x}", secs, random)
}

/// Validates a single reference submitted for `field`, returning it in canonical form.
pub fn parse_id(field: &'static str, raw: &str) -> ServiceResult<String> {
    let candidate = raw.trim();
    if is_well_formed_id(candidate) {
        Ok(candidate.to_ascii_lowercase())
    } else {
        Err(ServiceError::invalid(field, raw))
    }
}

/// An id list as submitted by a client: a lone value or a sequence of values.
/// Absence is modelled by the surrounding `Option`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawIdList {
    One(String),
    Many(Vec<String>),
}

impl RawIdList {
    /// Multi-valued form fields collapse to `One` when a single value was sent.
    pub fn from_values(mut values: Vec<String>) -> Option<RawIdList> {
        match values.len() {
            0 => None,
            1 => values.pop().map(RawIdList::One),
            _ => Some(RawIdList::Many(values)),
        }
    }

    pub fn into_candidates(self) -> Vec<String> {
        match self {
            RawIdList::One(value) => vec![value],
            RawIdList::Many(values) => values,
        }
    }

    /// Ordered sequence of the well-formed identifiers, malformed entries dropped.
    pub fn into_well_formed(self) -> Vec<String> {
        self.into_candidates()
            .into_iter()
            .map(|candidate| candidate.trim().to_ascii_lowercase())
            .filter(|candidate| is_well_formed_id(candidate))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawIdList::One(value) => value.trim().is_empty(),
            RawIdList::Many(values) => values.iter().all(|v| v.trim().is_empty()),
        }
    }
}

/// Absent lists normalise to an empty sequence.
pub fn normalize_id_list(raw: Option<RawIdList>) -> Vec<String> {
    raw.map(RawIdList::into_well_formed).unwrap_or_default()
}
