//! Shared ownership helpers layered over `Rc`.
//!
//! Retaining an object is cloning its `Rc`, releasing is dropping it. What
//! this module adds is the pooling contract (an object only goes back to its
//! cache when nobody else holds it) and a scoped autorelease list.

use crate::pool::{ObjectPool, PoolStats, Resettable};
use std::cell::RefCell;
use std::rc::Rc;

impl<T: Resettable> Resettable for Rc<T> {
    fn reset(&mut self) {
        if let Some(inner) = Rc::get_mut(self) {
            inner.reset();
        }
    }
}

impl<T: Resettable> Resettable for RefCell<T> {
    fn reset(&mut self) {
        self.get_mut().reset();
    }
}

/// Replaces `dst` with `src`, releasing the previous value. Assigning an
/// object to itself is a no-op.
pub fn assign<T: ?Sized>(dst: &mut Option<Rc<T>>, src: Option<&Rc<T>>) {
    let same = match (dst.as_ref(), src) {
        (Some(old), Some(new)) => Rc::ptr_eq(old, new),
        (None, None) => true,
        _ => false,
    };
    if !same {
        *dst = src.cloned();
    }
}

/// Cache of reference counted objects.
pub struct RefCache<T: Resettable> {
    pool: ObjectPool<Rc<T>>,
}

impl<T: Resettable + 'static> RefCache<T> {
    pub fn new<F>(name: &'static str, capacity: usize, new_entry: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self {
            pool: ObjectPool::new(name, capacity, move || Rc::new(new_entry())),
        }
    }

    pub fn poll(&mut self) -> Rc<T> {
        self.pool.poll()
    }

    /// Hands `obj` back. It is recycled only when this was the last
    /// reference; otherwise it is simply released.
    pub fn push(&mut self, obj: Rc<T>) {
        if Rc::strong_count(&obj) == 1 && Rc::weak_count(&obj) == 0 {
            self.pool.push(obj);
        } else {
            self.pool.forget();
        }
    }

    pub fn clear(&mut self) {
        self.pool.clear();
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn name(&self) -> &'static str {
        self.pool.name()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl<T: Resettable> std::fmt::Debug for RefCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefCache").field("pool", &self.pool).finish()
    }
}

/// Keeps temporaries alive until the end of a scope.
///
/// Every tracked object is released once when the pool ends (or is
/// dropped). Objects still held elsewhere survive.
pub struct AutoreleasePool<T: ?Sized> {
    list: Vec<Rc<T>>,
}

impl<T: ?Sized> AutoreleasePool<T> {
    pub fn begin() -> Self {
        Self { list: Vec::new() }
    }

    pub fn autorelease(&mut self, obj: Rc<T>) -> Rc<T> {
        self.list.push(Rc::clone(&obj));
        obj
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn end(self) {}
}

impl<T: ?Sized> Drop for AutoreleasePool<T> {
    fn drop(&mut self) {
        self.list.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Payload {
        value: i32,
    }

    impl Resettable for Payload {
        fn reset(&mut self) {
            self.value = 0;
        }
    }

    #[test]
    fn assign_tolerates_self_assignment() {
        let a = Rc::new(5);
        let mut slot = Some(Rc::clone(&a));
        assign(&mut slot, Some(&a));
        assert_eq!(Rc::strong_count(&a), 2);

        let b = Rc::new(6);
        assign(&mut slot, Some(&b));
        assert_eq!(Rc::strong_count(&a), 1);
        assert_eq!(Rc::strong_count(&b), 2);

        assign(&mut slot, None);
        assert_eq!(Rc::strong_count(&b), 1);
        assert!(slot.is_none());
    }

    #[test]
    fn cache_only_recycles_unshared_objects() {
        let mut cache = RefCache::new("payload", 8, Payload::default);
        let first = cache.poll();
        let holder = Rc::clone(&first);
        cache.push(first);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().current, 0);

        cache.push(holder);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn recycled_objects_are_reset() {
        let mut cache = RefCache::new("payload", 8, Payload::default);
        let mut obj = cache.poll();
        Rc::get_mut(&mut obj).unwrap().value = 42;
        cache.push(obj);

        let again = cache.poll();
        assert_eq!(again.value, 0);
        assert_eq!(cache.stats().alloced, 1);
    }

    #[test]
    fn autorelease_releases_at_scope_end() {
        let survivor = Rc::new(1);
        let mut pool = AutoreleasePool::begin();
        let temp = pool.autorelease(Rc::new(2));
        pool.autorelease(Rc::clone(&survivor));
        let weak = Rc::downgrade(&temp);
        drop(temp);
        assert!(weak.upgrade().is_some());
        assert_eq!(pool.len(), 2);

        pool.end();
        assert!(weak.upgrade().is_none());
        assert_eq!(Rc::strong_count(&survivor), 1);
    }
}
