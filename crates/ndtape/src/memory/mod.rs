//! Memory management primitives.
//!
//! ```text
//! aligned    AlignedAllocator<T, ALIGN>, AlignedBuffer<T, ALIGN>
//! policy     CountPolicy { Local, Atomic }, RefCounts<P>
//! intrusive  IntrusiveTarget, IntrusivePtr<T>, acquire/release
//! weak       WeakIntrusiveTarget, WeakIntrusivePtr<T>
//! ```

pub mod aligned;
pub mod intrusive;
pub mod policy;
pub mod weak;

pub use aligned::{AlignedAllocator, AlignedBuffer, RECORD_ALIGNMENT, STORE_ALIGNMENT};
pub use intrusive::{
    IntrusivePtr, IntrusiveTarget, WeakIntrusiveTarget, acquire, acquire_weak, release,
    release_weak, try_upgrade,
};
pub use policy::{Atomic, CountPolicy, Local, RefCounts};
pub use weak::WeakIntrusivePtr;
