use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TravelerId = Uuid;

/// A traveler sharing trip costs, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Participant(String);

impl Participant {
    /// Create a participant from a name. Surrounding whitespace is dropped.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Participant {
    fn from(name: &str) -> Self {
        Participant::new(name)
    }
}

/// A traveler registered on the trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Traveler {
    pub id: TravelerId,
    pub participant: Participant,
    pub added_at: DateTime<Utc>,
}

impl Traveler {
    pub fn new(participant: Participant) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant,
            added_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        self.participant.name()
    }
}

/// The fixed set of known travelers for one computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    members: BTreeSet<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from names, ignoring blanks and duplicates.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(Participant::new)
            .filter(|p| !p.name().is_empty())
            .collect()
    }

    pub fn contains(&self, participant: &Participant) -> bool {
        self.members.contains(participant)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.members.iter()
    }

    /// Keep only known members of `split`, de-duplicated, in first-seen order.
    pub fn restrict(&self, split: &[Participant]) -> Vec<Participant> {
        let mut seen = BTreeSet::new();
        split
            .iter()
            .filter(|p| self.contains(p) && seen.insert(*p))
            .cloned()
            .collect()
    }
}

impl FromIterator<Participant> for Roster {
    fn from_iter<I: IntoIterator<Item = Participant>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

/// Parse a comma-separated split list such as `"Asha, Ben,Chen"`.
pub fn parse_split_list(raw: &str) -> Vec<Participant> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Participant::new)
        .collect()
}

/// Join participants back into the stored comma-separated form.
pub fn join_split_list(split: &[Participant]) -> String {
    split
        .iter()
        .map(Participant::name)
        .collect::<Vec<_>>()
        .join(",")
}
