use std::collections::{HashMap, HashSet};

use crate::counter::TrackId;

/// (track identifier, epoch): one physical presence of a track
pub type CountedKey = (TrackId, u32);

/// Remembers which presences have already been counted.
///
/// No time-based expiry: epochs only grow, so an old key can never come back.
#[derive(Debug, Default)]
pub struct EventDeduplicator {
    counted: HashSet<CountedKey>,
}

impl EventDeduplicator {
    pub fn new() -> Self {
        EventDeduplicator {
            counted: HashSet::new(),
        }
    }
    /// Returns true only on the first claim of the pair
    ///
    /// Basic usage:
    ///
    /// ```
    /// use people_counter_rs::counter::EventDeduplicator;
    /// let mut dedup = EventDeduplicator::new();
    /// assert!(dedup.try_claim(7, 0));
    /// assert!(!dedup.try_claim(7, 0));
    /// assert!(dedup.try_claim(7, 1));
    /// ```
    pub fn try_claim(&mut self, track_id: TrackId, epoch: u32) -> bool {
        self.counted.insert((track_id, epoch))
    }
    pub fn contains(&self, track_id: TrackId, epoch: u32) -> bool {
        self.counted.contains(&(track_id, epoch))
    }
    pub fn len(&self) -> usize {
        self.counted.len()
    }
    pub fn is_empty(&self) -> bool {
        self.counted.is_empty()
    }
}

/// Hands out display-only person numbers, one per counted presence
#[derive(Debug)]
pub struct PersonIds {
    next_person_id: u64,
    assigned: HashMap<CountedKey, u64>,
}

impl Default for PersonIds {
    fn default() -> Self {
        PersonIds {
            next_person_id: 1,
            assigned: HashMap::new(),
        }
    }
}

impl PersonIds {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get_or_assign(&mut self, key: CountedKey) -> u64 {
        if let Some(person_id) = self.assigned.get(&key) {
            return *person_id;
        }
        let person_id = self.next_person_id;
        self.next_person_id += 1;
        self.assigned.insert(key, person_id);
        person_id
    }
    pub fn get(&self, key: &CountedKey) -> Option<u64> {
        self.assigned.get(key).copied()
    }
}
