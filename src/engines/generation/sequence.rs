use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

type Source<T> = Box<dyn Iterator<Item = T> + Send>;

/// A lazily materialised sequence shared between threads.
///
/// Each call to [`LazySequence::next`] atomically claims the next index, so
/// concurrent callers never receive the same element twice in one pass.
/// Elements are pulled from the source on demand and kept, which makes the
/// sequence restartable.
pub struct LazySequence<T> {
    cursor: AtomicUsize,
    backing: Mutex<Backing<T>>,
}

struct Backing<T> {
    items: Vec<T>,
    source: Option<Source<T>>,
}

impl<T: Clone> LazySequence<T> {
    pub fn new<I>(source: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self {
            cursor: AtomicUsize::new(0),
            backing: Mutex::new(Backing {
                items: Vec::new(),
                source: Some(Box::new(source.into_iter())),
            }),
        }
    }

    pub fn empty() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            backing: Mutex::new(Backing {
                items: Vec::new(),
                source: None,
            }),
        }
    }

    /// Claims the next element, `None` once the sequence is exhausted.
    pub fn next(&self) -> Option<T> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.get(index)
    }

    pub fn get(&self, index: usize) -> Option<T> {
        let mut backing = self.backing.lock();
        while backing.items.len() <= index {
            let next = backing.source.as_mut().and_then(|source| source.next());
            match next {
                Some(item) => backing.items.push(item),
                None => {
                    backing.source = None;
                    return None;
                }
            }
        }
        backing.items.get(index).cloned()
    }

    /// Rewinds the cursor; already materialised elements are replayed.
    pub fn restart(&self) {
        self.cursor.store(0, Ordering::SeqCst);
    }

    pub fn materialized(&self) -> usize {
        self.backing.lock().items.len()
    }
}
