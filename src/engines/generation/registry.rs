use crate::engines::generation::genome::Genome;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Canonical hash to the single frozen genome carrying it.
///
/// Insertion is linearizable per hash: concurrent registrations of the same
/// hash produce one winner and every caller gets that instance back. The
/// map's shard lock is released before the ordered list is touched.
#[derive(Default)]
pub struct GenomeRegistry {
    genomes: DashMap<String, Arc<Genome>>,
    ordered: RwLock<Vec<Arc<Genome>>>,
}

impl GenomeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &str) -> Option<Arc<Genome>> {
        self.genomes.get(hash).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.genomes.contains_key(hash)
    }

    /// Inserts `genome` unless its hash is taken. Returns the authoritative
    /// instance and whether this call inserted it.
    pub fn insert_or_get(&self, genome: Arc<Genome>) -> (Arc<Genome>, bool) {
        let (winner, inserted) = match self.genomes.entry(genome.hash().to_string()) {
            Entry::Occupied(existing) => (Arc::clone(existing.get()), false),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&genome));
                (genome, true)
            }
        };
        if inserted {
            self.ordered.write().push(Arc::clone(&winner));
        }
        (winner, inserted)
    }

    pub fn random<R: Rng>(&self, rng: &mut R) -> Option<Arc<Genome>> {
        self.ordered.read().choose(rng).cloned()
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }
}
