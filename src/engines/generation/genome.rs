//! Genome: one expression tree plus the lazily derived views the search needs.
//!
//! A genome's identity is its canonical string. Genomes built by hand can be
//! edited through [`Genome::modify`]; once a genome is registered it is frozen
//! and shared as `Arc<Genome>` with no mutable access left.

use crate::engines::generation::sequence::LazySequence;
use crate::engines::generation::variation;
use crate::error::{EqforgeError, Result};
use crate::genes::Gene;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

pub struct Genome {
    root: Gene,
    hash: String,
    version: u64,
    frozen: bool,
    reduced_cache: Mutex<Option<ReducedCache>>,
    reduced: Option<Arc<Genome>>,
    variations: LazySequence<Gene>,
    mutations: LazySequence<Gene>,
}

struct ReducedCache {
    version: u64,
    /// `None` when the root is already canonical.
    root: Option<Gene>,
}

/// Root shape every genome shares.
///
/// A leaf root is wrapped in a single-child sum so it renders as a group,
/// `(a)`; a negative leaf keeps its sign on the sum, `-(a)`. A single-child
/// sum around a composite is unwrapped into that composite.
pub(crate) fn normalize_root(mut root: Gene) -> Gene {
    loop {
        if root.is_sum() && root.children().len() == 1 && !root.children()[0].is_leaf() {
            let multiple = root.multiple();
            let inner = root.children[0].clone();
            let scaled = inner.multiple() * multiple;
            root = inner.with_multiple(scaled);
            continue;
        }
        if root.is_leaf() {
            let multiple = root.multiple();
            if multiple < 0.0 {
                return Gene::sum(vec![root.with_multiple(-multiple)]).with_multiple(-1.0);
            }
            return Gene::sum(vec![root]);
        }
        return root;
    }
}

impl Genome {
    pub fn new(root: Gene) -> Self {
        let root = normalize_root(root);
        let hash = root.to_string();
        let variations = LazySequence::new(variation::variations(root.clone()));
        Self {
            root,
            hash,
            version: 0,
            frozen: false,
            reduced_cache: Mutex::new(None),
            reduced: None,
            variations,
            mutations: LazySequence::empty(),
        }
    }

    pub fn root(&self) -> &Gene {
        &self.root
    }

    /// Canonical string of the root; the deduplication key.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn size(&self) -> usize {
        self.root.size()
    }

    pub fn calculate(&self, values: &[f64]) -> f64 {
        self.root.calculate(values)
    }

    /// Edits the tree of an unregistered genome, bumping its version.
    pub fn modify<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Gene),
    {
        if self.frozen {
            return Err(EqforgeError::Contract(format!(
                "Genome {} is frozen",
                self.hash
            )));
        }
        edit(&mut self.root);
        self.root = normalize_root(std::mem::replace(&mut self.root, Gene::sum(Vec::new())));
        self.hash = self.root.to_string();
        self.version += 1;
        self.variations = LazySequence::new(variation::variations(self.root.clone()));
        Ok(())
    }

    /// Reduced root, computed on a clone and cached per version.
    pub fn reduced_root(&self) -> Result<Option<Gene>> {
        let mut cache = self.reduced_cache.lock();
        if let Some(cached) = cache.as_ref() {
            if cached.version == self.version {
                return Ok(cached.root.clone());
            }
        }
        let reduced = normalize_root(self.root.reduced()?);
        let root = (reduced.to_string() != self.hash).then_some(reduced);
        *cache = Some(ReducedCache {
            version: self.version,
            root: root.clone(),
        });
        Ok(root)
    }

    pub fn is_reducible(&self) -> Result<bool> {
        if self.frozen {
            return Ok(self.reduced.is_some());
        }
        Ok(self.reduced_root()?.is_some())
    }

    /// The registered reduced counterpart, if this genome is registered and reducible.
    pub fn reduced(&self) -> Option<&Arc<Genome>> {
        self.reduced.as_ref()
    }

    /// The canonical form of this genome; itself when already canonical.
    pub fn as_reduced(self: &Arc<Self>) -> Result<Arc<Genome>> {
        if let Some(reduced) = &self.reduced {
            return Ok(Arc::clone(reduced));
        }
        if self.frozen {
            return Ok(Arc::clone(self));
        }
        Ok(match self.reduced_root()? {
            Some(root) => Arc::new(Genome::new(root)),
            None => Arc::clone(self),
        })
    }

    pub fn next_variation(&self) -> Option<Gene> {
        self.variations.next()
    }

    pub fn next_mutation(&self) -> Option<Gene> {
        self.mutations.next()
    }

    pub fn restart_streams(&self) {
        self.variations.restart();
        self.mutations.restart();
    }

    pub(crate) fn attach(&mut self, reduced: Option<Arc<Genome>>, mutations: LazySequence<Gene>) {
        self.reduced = reduced;
        self.mutations = mutations;
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}

impl fmt::Debug for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Genome")
            .field("hash", &self.hash)
            .field("version", &self.version)
            .field("frozen", &self.frozen)
            .field("reduced", &self.reduced.as_ref().map(|r| r.hash()))
            .finish()
    }
}
