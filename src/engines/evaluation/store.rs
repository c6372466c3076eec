use crate::engines::evaluation::Fitness;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Local and global fitness per genome hash.
#[derive(Default)]
pub struct FitnessStore {
    local: Mutex<HashMap<String, Fitness>>,
    global: Mutex<HashMap<String, Fitness>>,
}

impl FitnessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &str, global: bool) -> Option<Fitness> {
        self.map(global).lock().get(hash).cloned()
    }

    pub fn get_or_create(&self, hash: &str) -> Fitness {
        self.local
            .lock()
            .entry(hash.to_string())
            .or_default()
            .clone()
    }

    /// Merges `sample` into the entry for `hash` and returns the result.
    pub fn add(&self, hash: &str, sample: &Fitness, global: bool) -> Fitness {
        let mut map = self.map(global).lock();
        let entry = map.entry(hash.to_string()).or_default();
        entry.merge(sample);
        entry.clone()
    }

    pub fn len(&self, global: bool) -> usize {
        self.map(global).lock().len()
    }

    pub fn clear(&self) {
        self.local.lock().clear();
        self.global.lock().clear();
    }

    fn map(&self, global: bool) -> &Mutex<HashMap<String, Fitness>> {
        if global {
            &self.global
        } else {
            &self.local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_and_global_are_separate() {
        let store = FitnessStore::new();
        assert_eq!(store.get_or_create("(a)").count, 0);
        store.add("(a)", &Fitness::sample(0.5, false), false);
        let merged = store.add("(a)", &Fitness::sample(1.0, true), false);
        assert_eq!(merged.count, 2);
        assert!(store.get("(a)", true).is_none());

        store.add("(a)", &merged, true);
        assert_eq!(store.get("(a)", true).map(|f| f.count), Some(2));
        assert_eq!(store.len(false), 1);

        store.clear();
        assert!(store.get("(a)", false).is_none());
    }
}
