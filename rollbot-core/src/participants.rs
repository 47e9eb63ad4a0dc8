use crate::types::Participant;
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Opt-in entries of one roll event, unique by `user_id`.
///
/// Every operation takes the internal lock, so a set can be shared between
/// the reply handler and a pending draw. Readers that need a stable view call
/// [`ParticipantSet::snapshot`].
#[derive(Default)]
pub struct ParticipantSet {
    entries: Mutex<BTreeMap<i64, Participant>>,
}

impl ParticipantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the user was already present.
    pub fn add(&self, participant: Participant) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&participant.user_id) {
            return false;
        }
        entries.insert(participant.user_id, participant);
        true
    }

    pub fn has(&self, user_id: i64) -> bool {
        self.entries.lock().contains_key(&user_id)
    }

    pub fn remove(&self, user_id: i64) -> Option<Participant> {
        self.entries.lock().remove(&user_id)
    }

    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn snapshot(&self) -> Vec<Participant> {
        self.entries.lock().values().cloned().collect()
    }
}

impl FromIterator<Participant> for ParticipantSet {
    fn from_iter<I: IntoIterator<Item = Participant>>(iter: I) -> Self {
        let set = Self::new();
        for participant in iter {
            set.add(participant);
        }
        set
    }
}

impl Clone for ParticipantSet {
    fn clone(&self) -> Self {
        self.snapshot().into_iter().collect()
    }
}

impl std::fmt::Debug for ParticipantSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.snapshot()).finish()
    }
}

impl Serialize for ParticipantSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ParticipantSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = Vec::<Participant>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
