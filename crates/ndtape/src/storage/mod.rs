//! Shaped tensor storage.
//!
//! ```text
//! Store<T, R>        owned, rank in the type, aligned buffer
//! ├── StoreView<T, R>  borrowed
//! DynStore<T>        owned, rank at runtime (tape slots)
//! └── DynView<T>       borrowed
//! ```

mod dynamic;
mod store;
mod view;

pub use dynamic::{DynExtents, DynStore, DynView};
pub use store::Store;
pub use view::StoreView;
