use std::collections::HashMap;

use crate::structs::clip::ClipInformation;

/// Parsed clip information shared across playlist reads of one disc.
///
/// Each clip is parsed at most once per cache; entries are never evicted.
/// The cache does no locking, callers sharing it across threads wrap it in
/// a `Mutex`.
#[derive(Debug, Clone, Default)]
pub struct ClipCache {
    clips: HashMap<u32, ClipInformation>,
}

impl ClipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, clip: u32) -> Option<&ClipInformation> {
        self.clips.get(&clip)
    }

    pub fn contains(&self, clip: u32) -> bool {
        self.clips.contains_key(&clip)
    }

    pub fn insert(&mut self, info: ClipInformation) {
        self.clips.insert(info.clip, info);
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}
