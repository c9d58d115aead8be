//! Closure-table maintenance for SeaORM entities.
//!
//! A closure table stores one `(ancestor, descendant, distance)` row for every
//! pair of nodes on the same root path, so hierarchical reads become a single
//! indexed lookup. This crate keeps that table exact while nodes are inserted,
//! moved and deleted, and can rebuild or repair it from the parent pointers.
//! Queries are built through SeaORM, so any backend it supports works;
//! PostgreSQL additionally serializes mutations with an advisory lock.

pub mod builder;
pub mod config;
pub mod error;
pub mod hooks;
pub mod lock;
pub mod mutator;
pub mod query;
pub mod repair;
pub mod repository;
pub mod store;
pub mod traits;

pub mod prelude {
    //! Convenient re-exports for consumers.
    pub use crate::builder::{flat_to_tree, flatten, TreeNode};
    pub use crate::config::{
        AdvisoryLockStrategy, ClosureTreeConfig, ClosureTreeOptions, OrderStrategy, RootSentinel,
    };
    pub use crate::mutator::DetachScope;
    pub use crate::repository::ClosureTreeRepository;
    pub use crate::store::ClosureEdge;
    pub use crate::traits::ClosureTreeModel;
}

pub use builder::{flat_to_tree, flatten, PreOrder, TreeNode};
pub use closure_table_macros::ClosureTreeModel as ClosureTreeModelDerive;
#[doc(hidden)]
pub use closure_table_macros::ClosureTreeModel;
pub use config::{
    AdvisoryLockKey, AdvisoryLockStrategy, ClosureTreeConfig, ClosureTreeOptions, OrderStrategy,
    RootSentinel,
};
pub use error::ClosureTreeError;
pub use mutator::DetachScope;
pub use repository::ClosureTreeRepository;
pub use store::{ClosureEdge, ClosureStore};
pub use traits::ClosureTreeModel;

#[doc(hidden)]
pub mod __private {
    pub use once_cell;
}
