//! Decision tree storage.
//!
//! `GraphStore` owns the live snapshot and is the only way to change it:
//! roots are created once, children are attached through `insert_children`,
//! and nodes can be moved. Every committed change is broadcast on the event
//! bus and handed to a `SnapshotWriter`, which saves full snapshots through
//! the `PersistenceGateway` one at a time, in commit order.
//!
//! Sibling positions come from `LayoutEngine`, a pure function of the parent,
//! its current children, and the number of children being added.

pub mod layout;
pub mod store;
pub mod writer;

pub use layout::{layout_children, LayoutEngine};
pub use store::{check_tree, GraphStore};
pub use writer::SnapshotWriter;
