//! Conversion between flat parent-pointer lists and nested trees, and the
//! closure rebuild that walks a nested tree.

use std::collections::HashMap;
use std::hash::Hash;

use sea_orm::{ColumnTrait, Condition, ConnectionTrait, TransactionTrait};
use serde::Serialize;

use crate::error::ClosureTreeError;
use crate::mutator::DetachScope;
use crate::repository::ClosureTreeRepository;
use crate::traits::ClosureTreeModel;

/// A node together with its nested children.
///
/// Serializes as the node's own fields followed by a `children` array.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeNode<T> {
    #[serde(flatten)]
    pub node: T,
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    /// Pre-order traversal of this node and everything below it.
    pub fn iter(&self) -> PreOrder<'_, T> {
        PreOrder { stack: vec![self] }
    }

    /// Number of nodes in this subtree, itself included.
    pub fn size(&self) -> usize {
        self.iter().count()
    }
}

/// Pre-order iterator over one or more trees.
pub struct PreOrder<'a, T> {
    stack: Vec<&'a TreeNode<T>>,
}

impl<'a, T> PreOrder<'a, T> {
    pub fn forest(forest: &'a [TreeNode<T>]) -> Self {
        Self {
            stack: forest.iter().rev().collect(),
        }
    }
}

impl<'a, T> Iterator for PreOrder<'a, T> {
    type Item = &'a TreeNode<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        self.stack.extend(current.children.iter().rev());
        Some(current)
    }
}

/// Groups `items` into a forest using their keys and parent keys.
///
/// An item whose parent key is absent from `items` becomes a top-level
/// entry. Children keep their input order. Items caught in a parent cycle
/// are emitted as top-level entries, so every input item appears exactly once.
pub fn flat_to_tree<T, K, FK, FP>(items: Vec<T>, key: FK, parent_key: FP) -> Vec<TreeNode<T>>
where
    K: Eq + Hash,
    FK: Fn(&T) -> K,
    FP: Fn(&T) -> Option<K>,
{
    let count = items.len();
    let index: HashMap<K, usize> = items
        .iter()
        .enumerate()
        .map(|(position, item)| (key(item), position))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut tops = Vec::new();

    for (position, item) in items.iter().enumerate() {
        match parent_key(item).and_then(|parent| index.get(&parent).copied()) {
            Some(parent) if parent != position => children[parent].push(position),
            _ => tops.push(position),
        }
    }

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut built: Vec<Option<TreeNode<T>>> = (0..count).map(|_| None).collect();
    let mut visited = vec![false; count];
    let mut forest = Vec::with_capacity(tops.len());

    let starts = tops.into_iter().chain(0..count);
    for start in starts {
        if visited[start] {
            continue;
        }
        visited[start] = true;

        // (position, children already pushed)
        let mut stack = vec![(start, false)];
        while let Some((position, expanded)) = stack.pop() {
            if expanded {
                let nested = children[position]
                    .iter()
                    .filter_map(|child| built[*child].take())
                    .collect();
                built[position] = slots[position]
                    .take()
                    .map(|node| TreeNode { node, children: nested });
                continue;
            }

            stack.push((position, true));
            for &child in children[position].iter().rev() {
                if !visited[child] {
                    visited[child] = true;
                    stack.push((child, false));
                }
            }
        }

        if let Some(tree) = built[start].take() {
            forest.push(tree);
        }
    }

    forest
}

/// Pre-order flattening of a forest, consuming it.
pub fn flatten<T>(forest: Vec<TreeNode<T>>) -> Vec<T> {
    let mut flat = Vec::new();
    let mut stack: Vec<TreeNode<T>> = forest.into_iter().rev().collect();

    while let Some(TreeNode { node, children }) = stack.pop() {
        flat.push(node);
        stack.extend(children.into_iter().rev());
    }

    flat
}

impl<M> ClosureTreeRepository<M>
where
    M: ClosureTreeModel,
{
    /// The subtree rooted at `model`, built from its closure rows.
    pub async fn tree<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<TreeNode<M>>, ClosureTreeError> {
        let subtree = self.store.descendant_ids_query(&model.id(), true);
        let nodes = self
            .models_where(conn, Condition::all().add(M::id_column().in_subquery(subtree)))
            .await?;
        Ok(flat_to_tree(nodes, M::id, M::parent_id))
    }

    /// Nested view of [`besides`](Self::besides); empty for a root.
    pub async fn beside_tree<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<TreeNode<M>>, ClosureTreeError> {
        let id = model.id();
        let root_id = self.root_id_of(conn, &id).await?;

        let outside = Condition::all()
            .add(M::id_column().in_subquery(self.store.descendant_ids_query(&root_id, true)))
            .add(M::id_column().not_in_subquery(self.store.descendant_ids_query(&id, true)));
        let nodes = self.models_where(conn, outside).await?;
        Ok(flat_to_tree(nodes, M::id, M::parent_id))
    }

    /// Every entity, nested by parent pointer.
    pub async fn forest<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Vec<TreeNode<M>>, ClosureTreeError> {
        let nodes = self.all_nodes(conn).await?;
        Ok(flat_to_tree(nodes, M::id, M::parent_id))
    }

    /// Re-derives the ancestor rows of every node in `forest` from the parent
    /// pointer the node carries, parents before children. Returns the number
    /// of nodes reconciled.
    pub async fn rebuild_from_tree<C>(
        &self,
        conn: &C,
        forest: &[TreeNode<M>],
    ) -> Result<usize, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.rebuild_walk_on(guard.connection(), PreOrder::forest(forest)).await;
        guard.finish(result).await
    }

    /// Clears the closure table and regenerates it from the parent pointers
    /// of every entity.
    pub async fn rebuild_all<C>(&self, conn: &C) -> Result<usize, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.rebuild_all_on(guard.connection()).await;
        guard.finish(result).await
    }

    async fn rebuild_all_on<C: ConnectionTrait>(&self, conn: &C) -> Result<usize, ClosureTreeError> {
        let cleared = self.store.delete_where(conn, Condition::all()).await?;
        let forest = self.forest(conn).await?;
        let rebuilt = self.rebuild_walk_on(conn, PreOrder::forest(&forest)).await?;
        tracing::info!(
            "rebuilt closure table: cleared {} rows, reconciled {} nodes",
            cleared,
            rebuilt
        );
        Ok(rebuilt)
    }

    /// Reconciles each visited node; the first failure aborts the walk.
    pub(crate) async fn rebuild_walk_on<'a, C: ConnectionTrait>(
        &self,
        conn: &C,
        walk: impl Iterator<Item = &'a TreeNode<M>>,
    ) -> Result<usize, ClosureTreeError> {
        let mut reconciled = 0;
        for tree in walk {
            let id = tree.node.id();
            if let Err(err) = self
                .reconcile_on(conn, &id, tree.node.parent_id().as_ref())
                .await
            {
                tracing::warn!("closure reconciliation aborted at node {:?}: {}", id, err);
                return Err(ClosureTreeError::repair(&id, err));
            }
            reconciled += 1;
        }
        Ok(reconciled)
    }

    /// Replaces the ancestor rows of `id` with the ones implied by `parent`.
    pub(crate) async fn reconcile_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
        parent: Option<&M::Id>,
    ) -> Result<u64, ClosureTreeError> {
        self.detach_on(conn, id, DetachScope::AncestorOnly).await?;
        self.insert_closure_on(conn, id, parent).await
    }
}
