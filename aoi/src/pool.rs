/// Running allocation counters for one pooled type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances built by the constructor because the cache was empty.
    pub alloced: u64,
    /// Instances dropped for good (cache full or cleared).
    pub freed: u64,
    /// Instances handed out and not yet pushed back.
    pub current: u64,
    /// Instances waiting in the cache.
    pub cached: usize,
}

pub struct ObjectPool<T: Resettable> {
    name: &'static str,
    pool: Vec<T>,
    max_size: usize,
    new_entry: Box<dyn Fn() -> T>,
    stats: PoolStats,
}

impl<T> ObjectPool<T>
where
    T: Resettable,
{
    // Create a new ObjectPool holding at most `max_size` idle objects
    pub fn new<F>(name: &'static str, max_size: usize, new_entry: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        ObjectPool {
            name,
            pool: Vec::new(),
            max_size,
            new_entry: Box::new(new_entry),
            stats: PoolStats::default(),
        }
    }

    pub fn with_default(name: &'static str, max_size: usize) -> Self
    where
        T: Default + 'static,
    {
        Self::new(name, max_size, T::default)
    }

    // Pop an idle object, or build a fresh one when the cache is empty
    pub fn poll(&mut self) -> T {
        self.stats.current += 1;
        match self.pool.pop() {
            Some(obj) => obj,
            None => {
                self.stats.alloced += 1;
                (self.new_entry)()
            }
        }
    }

    // Return an object to the pool if the pool is not full, otherwise discard the object
    // Call the reset method before returning it
    pub fn push(&mut self, mut obj: T) {
        self.stats.current = self.stats.current.saturating_sub(1);
        if self.pool.len() < self.max_size {
            obj.reset();
            self.pool.push(obj);
        } else {
            self.stats.freed += 1;
        }
    }

    // The object left the pool's custody without being destroyed
    pub(crate) fn forget(&mut self) {
        self.stats.current = self.stats.current.saturating_sub(1);
    }

    // Clear all objects from the pool
    pub fn clear(&mut self) {
        self.stats.freed += self.pool.len() as u64;
        self.pool.clear();
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            cached: self.pool.len(),
            ..self.stats
        }
    }
}

impl<T: Resettable> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("name", &self.name)
            .field("max_size", &self.max_size)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Brings a recycled object back to its freshly built state.
pub trait Resettable {
    fn reset(&mut self);
}
