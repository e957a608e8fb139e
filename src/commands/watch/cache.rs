use std::collections::{HashSet, VecDeque};

/// Fingerprints of files dispatched by this process, bounded to `capacity`
/// entries with the oldest evicted first.
#[derive(Debug)]
pub struct RecentFileCache {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl RecentFileCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    #[cfg(test)]
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.members.contains(fingerprint)
    }

    /// Returns false when the fingerprint was already present.
    pub fn insert(&mut self, fingerprint: String) -> bool {
        if self.members.contains(&fingerprint) {
            return false;
        }

        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }

        self.members.insert(fingerprint.clone());
        self.order.push_back(fingerprint);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}
