//! Integration tests for aligned allocation and intrusive counting.

use ndtape::memory::{
    AlignedAllocator, AlignedBuffer, Atomic, CountPolicy, IntrusivePtr, IntrusiveTarget, Local,
    RefCounts, WeakIntrusiveTarget, acquire, acquire_weak, release, release_weak,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

struct Tracked<P: CountPolicy> {
    counts: RefCounts<P>,
    drops: Arc<AtomicUsize>,
    payload: [u64; 3],
}

impl<P: CountPolicy> Tracked<P> {
    fn new(drops: &Arc<AtomicUsize>) -> Self {
        Self {
            counts: RefCounts::new(),
            drops: Arc::clone(drops),
            payload: [1, 2, 3],
        }
    }
}

impl<P: CountPolicy> Drop for Tracked<P> {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

unsafe impl<P: CountPolicy> IntrusiveTarget for Tracked<P> {
    type Policy = P;

    fn ref_counts(&self) -> &RefCounts<P> {
        &self.counts
    }
}

unsafe impl<P: CountPolicy> WeakIntrusiveTarget for Tracked<P> {}

fn balanced_acquire_release<P: CountPolicy>() {
    let drops = Arc::new(AtomicUsize::new(0));
    let owner = IntrusivePtr::new(Tracked::<P>::new(&drops));
    let raw = NonNull::from(&*owner);

    for _ in 0..10 {
        acquire(&*owner);
    }
    assert_eq!(IntrusivePtr::strong_count(&owner), 11);
    for _ in 0..10 {
        unsafe { release(raw) };
    }
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(owner);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_exactly_one_destruction_local() {
    balanced_acquire_release::<Local>();
}

#[test]
fn test_exactly_one_destruction_atomic() {
    balanced_acquire_release::<Atomic>();
}

#[test]
fn test_free_weak_functions() {
    let drops = Arc::new(AtomicUsize::new(0));
    let owner = IntrusivePtr::new(Tracked::<Local>::new(&drops));
    let raw = NonNull::from(&*owner);
    let counts = NonNull::from(owner.ref_counts());

    acquire_weak(&*owner);
    assert_eq!(IntrusivePtr::weak_count(&owner), 1);
    drop(owner);
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    // The counters outlive the object while the weak reference is held.
    assert!(!unsafe { ndtape::memory::try_upgrade(counts) });
    unsafe { release_weak(raw, counts) };
}

#[test]
fn test_weak_upgrade_fails_after_last_strong() {
    let drops = Arc::new(AtomicUsize::new(0));
    let strong = IntrusivePtr::new(Tracked::<Local>::new(&drops));
    let weak = IntrusivePtr::downgrade(&strong);
    assert_eq!(weak.upgrade().map(|p| p.payload), Some([1, 2, 3]));

    drop(strong);
    assert!(weak.upgrade().is_none());
    assert!(!weak.is_alive());
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cross_thread_release() {
    let drops = Arc::new(AtomicUsize::new(0));
    let strong = IntrusivePtr::new(Tracked::<Atomic>::new(&drops));
    let weak = IntrusivePtr::downgrade(&strong);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let strong = strong.clone();
            let weak = weak.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    if let Some(p) = weak.upgrade() {
                        assert_eq!(p.payload[2], 3);
                    }
                }
                drop(strong);
            })
        })
        .collect();
    drop(strong);
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_random_sizes_are_aligned() {
    let mut rng = StdRng::seed_from_u64(1234);
    let alloc = AlignedAllocator::<f64, 64>::new();
    for _ in 0..1000 {
        let n = rng.random_range(0..4096);
        let ptr = alloc.allocate(n).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 64, 0);
        unsafe { alloc.deallocate(ptr, n) };
    }
}

#[test]
fn test_buffer_alignment() {
    let buf: AlignedBuffer<u8, 128> = AlignedBuffer::filled(17, 0).unwrap();
    assert_eq!(buf.as_ptr() as usize % 128, 0);
    assert_eq!(buf.len(), 17);
}

#[test]
#[should_panic(expected = "reference count underflow")]
fn test_underflow_panics() {
    let counter = Local::new_counter(0);
    Local::decrement(&counter);
}
