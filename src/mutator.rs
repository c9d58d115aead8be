//! Structural mutations: insert, detach, attach, move and delete.
//!
//! Every public entry point opens a [`LockedTransaction`](crate::lock::LockedTransaction)
//! on the caller's connection and delegates to an `*_on` variant that only
//! issues statements on that transaction, so compound operations can reuse
//! the building blocks without nesting transactions.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    TransactionTrait,
};

use crate::config::RootSentinel;
use crate::error::ClosureTreeError;
use crate::repository::ClosureTreeRepository;
use crate::store::ClosureEdge;
use crate::traits::ClosureTreeModel;

/// Which closure rows [`ClosureTreeRepository::detach`] removes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DetachScope {
    /// Rows whose descendant is the node (its ancestor edges, self row included).
    AncestorOnly,
    /// Rows whose ancestor is the node (its descendant edges, self row included).
    DescendantOnly,
    /// Rows linking the node's proper ancestors to the node's subtree.
    Both,
}

impl<M> ClosureTreeRepository<M>
where
    M: ClosureTreeModel,
{
    /// Writes the self row of `id` plus one row per ancestor-or-self of
    /// `parent`, each one hop further away.
    pub async fn insert_closure<C>(
        &self,
        conn: &C,
        id: &M::Id,
        parent: Option<&M::Id>,
    ) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.insert_closure_on(guard.connection(), id, parent).await;
        guard.finish(result).await
    }

    pub async fn detach<C>(
        &self,
        conn: &C,
        id: &M::Id,
        scope: DetachScope,
    ) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.detach_on(guard.connection(), id, scope).await;
        guard.finish(result).await
    }

    /// Re-creates the rows severed by [`DetachScope::Both`] for a new parent.
    pub async fn attach_subtree_to<C>(
        &self,
        conn: &C,
        id: &M::Id,
        parent: Option<&M::Id>,
    ) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.attach_subtree_to_on(guard.connection(), id, parent).await;
        guard.finish(result).await
    }

    /// Moves `node` (and its whole subtree) under `parent`, or makes it a root
    /// when `parent` is `None`, and persists the new parent pointer.
    ///
    /// Fails with [`ClosureTreeError::Cycle`] before any write when `parent`
    /// lies inside the node's own subtree.
    pub async fn move_to<C>(
        &self,
        conn: &C,
        node: &M,
        parent: Option<&M::Id>,
    ) -> Result<M, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.move_on(guard.connection(), &node.id(), parent).await;
        guard.finish(result).await
    }

    pub async fn make_root<C>(&self, conn: &C, node: &M) -> Result<M, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.make_root_on(guard.connection(), &node.id()).await;
        guard.finish(result).await
    }

    /// Promotes every direct child of `node` to a root, then removes every
    /// closure row referencing `node`. The entity row itself is left alone.
    pub async fn delete_with_reparent_to_root<C>(
        &self,
        conn: &C,
        node: &M,
    ) -> Result<(), ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self
            .delete_with_reparent_on(guard.connection(), &node.id())
            .await;
        guard.finish(result).await
    }

    /// [`delete_with_reparent_to_root`](Self::delete_with_reparent_to_root)
    /// followed by deleting the entity row, as one unit.
    pub async fn destroy<C>(&self, conn: &C, node: &M) -> Result<(), ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.destroy_on(guard.connection(), &node.id()).await;
        guard.finish(result).await
    }

    pub async fn create_root<C>(
        &self,
        conn: &C,
        active: M::ActiveModel,
    ) -> Result<M, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.create_on(guard.connection(), None, active).await;
        guard.finish(result).await
    }

    pub async fn create_child<C>(
        &self,
        conn: &C,
        parent: &M,
        active: M::ActiveModel,
    ) -> Result<M, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self
            .create_child_on(guard.connection(), &parent.id(), active)
            .await;
        guard.finish(result).await
    }

    /// Inserts a node next to `sibling`, i.e. under the sibling's current parent.
    pub async fn create_sibling<C>(
        &self,
        conn: &C,
        sibling: &M,
        active: M::ActiveModel,
    ) -> Result<M, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self
            .create_sibling_on(guard.connection(), &sibling.id(), active)
            .await;
        guard.finish(result).await
    }

    pub async fn add_child<C>(&self, conn: &C, parent: &M, child: &M) -> Result<M, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let mut moved = self
            .add_children(conn, parent, std::slice::from_ref(child))
            .await?;
        moved
            .pop()
            .ok_or_else(|| ClosureTreeError::not_persisted(&child.id()))
    }

    /// Moves every node of `children` under `parent`; one cycle rolls back
    /// the whole batch.
    pub async fn add_children<C>(
        &self,
        conn: &C,
        parent: &M,
        children: &[M],
    ) -> Result<Vec<M>, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self
            .add_children_on(guard.connection(), &parent.id(), children)
            .await;
        guard.finish(result).await
    }

    /// Moves every node of `siblings` under the parent of `node` (to the
    /// roots when `node` is a root).
    pub async fn add_siblings<C>(
        &self,
        conn: &C,
        node: &M,
        siblings: &[M],
    ) -> Result<Vec<M>, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self
            .add_siblings_on(guard.connection(), &node.id(), siblings)
            .await;
        guard.finish(result).await
    }

    pub(crate) async fn insert_closure_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
        parent: Option<&M::Id>,
    ) -> Result<u64, ClosureTreeError> {
        let self_edge = ClosureEdge::new(id.clone(), id.clone(), 0);
        let mut inserted = self.store.insert_edges(conn, vec![self_edge]).await?;

        if let Some(parent) = parent {
            inserted += self.store.copy_ancestors_to(conn, id, parent).await?;
        }

        tracing::debug!(
            "inserted {} closure rows for node {:?} under {:?}",
            inserted,
            id,
            parent
        );
        Ok(inserted)
    }

    pub(crate) async fn detach_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
        scope: DetachScope,
    ) -> Result<u64, ClosureTreeError> {
        let value = M::closure_id_to_value(id);

        let condition = match scope {
            DetachScope::AncestorOnly => {
                Condition::all().add(M::closure_descendant_column().eq(value))
            }
            DetachScope::DescendantOnly => {
                Condition::all().add(M::closure_ancestor_column().eq(value))
            }
            DetachScope::Both => Condition::all()
                .add(
                    M::closure_descendant_column()
                        .in_subquery(self.store.descendant_ids_query(id, true)),
                )
                .add(
                    M::closure_ancestor_column()
                        .in_subquery(self.store.ancestor_ids_query(id, false)),
                ),
        };

        let deleted = self.store.delete_where(conn, condition).await?;
        tracing::debug!(
            "detached {} closure rows of node {:?} ({:?})",
            deleted,
            id,
            scope
        );
        Ok(deleted)
    }

    pub(crate) async fn attach_subtree_to_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
        parent: Option<&M::Id>,
    ) -> Result<u64, ClosureTreeError> {
        let Some(parent) = parent else {
            return Ok(0);
        };

        let inserted = self.store.cross_join_insert(conn, id, parent).await?;
        tracing::debug!(
            "attached subtree of node {:?} under {:?} with {} closure rows",
            id,
            parent,
            inserted
        );
        Ok(inserted)
    }

    /// Rewrites the closure rows of `node`'s subtree for a new parent without
    /// touching the parent pointer itself.
    pub(crate) async fn reattach_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        node: &M,
        parent: Option<&M::Id>,
    ) -> Result<(), ClosureTreeError> {
        let id = node.id();

        if let Some(parent) = parent {
            self.ensure_node(conn, parent).await?;
        }

        if !self.store.has_self_edge(conn, &id).await? {
            return Err(ClosureTreeError::not_a_node(&id));
        }

        if let Some(parent) = parent {
            if self.store.has_edge(conn, &id, parent).await? {
                tracing::warn!("rejected move of node {:?} under its descendant {:?}", id, parent);
                return Err(ClosureTreeError::cycle(&id, parent));
            }
        }

        self.detach_on(conn, &id, DetachScope::Both).await?;
        self.attach_subtree_to_on(conn, &id, parent).await?;
        Ok(())
    }

    pub(crate) async fn move_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
        parent: Option<&M::Id>,
    ) -> Result<M, ClosureTreeError> {
        let node = self.require_node(conn, id).await?;
        self.reattach_on(conn, &node, parent).await?;
        self.persist_parent(conn, node, parent.cloned()).await
    }

    async fn make_root_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<M, ClosureTreeError> {
        let node = self.require_node(conn, id).await?;
        if node.parent_id().is_none() {
            return Ok(node);
        }
        self.move_on(conn, id, None).await
    }

    pub(crate) async fn delete_with_reparent_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<(), ClosureTreeError> {
        self.require_node(conn, id).await?;

        // Every child subtree loses the rows tying it to the node and above,
        // so each child becomes a root of its own rather than moving up.
        let severed = Condition::all()
            .add(
                M::closure_descendant_column()
                    .in_subquery(self.store.descendant_ids_query(id, false)),
            )
            .add(
                M::closure_ancestor_column().in_subquery(self.store.ancestor_ids_query(id, true)),
            );
        let mut deleted = self.store.delete_where(conn, severed).await?;

        let value = M::closure_id_to_value(id);
        let remaining = Condition::any()
            .add(M::closure_ancestor_column().eq(value.clone()))
            .add(M::closure_descendant_column().eq(value));
        deleted += self.store.delete_where(conn, remaining).await?;

        let promoted = self.promote_children_on(conn, id).await?;

        tracing::debug!(
            "removed node {:?} from closure ({} rows), promoted {} children to roots",
            id,
            deleted,
            promoted
        );
        Ok(())
    }

    /// Points every direct child of `id` at the root sentinel in one UPDATE.
    async fn promote_children_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<u64, ClosureTreeError> {
        let sentinel = match self.config().root_sentinel() {
            RootSentinel::Null => Expr::cust("NULL"),
            RootSentinel::Zero => Expr::cust("0"),
        };

        let result = M::Entity::update_many()
            .col_expr(M::parent_column(), sentinel)
            .filter(M::parent_column().eq(M::id_to_value(id)))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    async fn destroy_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<(), ClosureTreeError> {
        self.delete_with_reparent_on(conn, id).await?;
        M::Entity::delete_many()
            .filter(M::id_column().eq(M::id_to_value(id)))
            .exec(conn)
            .await?;
        Ok(())
    }

    async fn create_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        parent: Option<M::Id>,
        mut active: M::ActiveModel,
    ) -> Result<M, ClosureTreeError> {
        M::set_parent(&mut active, parent.clone());
        let model = active.insert(conn).await?;
        self.insert_closure_on(conn, &model.id(), parent.as_ref())
            .await?;
        Ok(model)
    }

    async fn create_child_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        parent: &M::Id,
        active: M::ActiveModel,
    ) -> Result<M, ClosureTreeError> {
        self.ensure_node(conn, parent).await?;
        self.create_on(conn, Some(parent.clone()), active).await
    }

    async fn create_sibling_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        sibling: &M::Id,
        active: M::ActiveModel,
    ) -> Result<M, ClosureTreeError> {
        let sibling = self.ensure_node(conn, sibling).await?;
        self.create_on(conn, sibling.parent_id(), active).await
    }

    async fn add_children_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        parent: &M::Id,
        children: &[M],
    ) -> Result<Vec<M>, ClosureTreeError> {
        self.ensure_node(conn, parent).await?;

        let mut moved = Vec::with_capacity(children.len());
        for child in children {
            moved.push(self.move_on(conn, &child.id(), Some(parent)).await?);
        }
        Ok(moved)
    }

    async fn add_siblings_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
        siblings: &[M],
    ) -> Result<Vec<M>, ClosureTreeError> {
        let node = self.require_node(conn, id).await?;
        let parent = node.parent_id();

        let mut moved = Vec::with_capacity(siblings.len());
        for sibling in siblings {
            moved.push(self.move_on(conn, &sibling.id(), parent.as_ref()).await?);
        }
        Ok(moved)
    }

    /// Loads a node that is persisted and carries its self row.
    async fn ensure_node<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<M, ClosureTreeError> {
        let node = self.require_node(conn, id).await?;
        if self.store.has_self_edge(conn, id).await? {
            Ok(node)
        } else {
            Err(ClosureTreeError::not_a_node(id))
        }
    }

    async fn persist_parent<C: ConnectionTrait>(
        &self,
        conn: &C,
        node: M,
        parent: Option<M::Id>,
    ) -> Result<M, ClosureTreeError> {
        let mut active = node.into_active_model();
        M::set_parent(&mut active, parent);
        let updated = active.update(conn).await?;
        Ok(updated)
    }
}
