//! Index Module
//!
//! In-memory B-tree mapping timestamps to row offsets.
//!
//! ## Responsibilities
//! - O(log n) insert, point lookup and range query
//! - Min/max timestamp for range filtering
//! - No persistence of its own: the table layer rebuilds it on open
//!
//! ## Node Layout
//! Nodes live in an arena (`Vec<Node>`) and reference each other by index,
//! so there are no ownership cycles and dropping the tree is one
//! deallocation of the arena.
//!
//! ```text
//!                 ┌──────────────────────┐
//!                 │ Internal  [k0 .. kn] │   up to 63 keys, 64 children
//!                 └───┬──────┬───────┬───┘
//!                     │      │       │
//!          ┌──────────▼┐  ┌──▼─────┐ ┌▼──────────┐
//!          │ Leaf      │  │ Leaf   │ │ Leaf      │  up to 63 (key, row) pairs
//!          └───────────┘  └────────┘ └───────────┘
//! ```

mod btree;

pub use btree::{BTree, IndexEntry, MAX_KEYS, MIN_KEYS, ORDER};
