use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, QueryTrait,
    TransactionTrait,
};

use crate::builder::PreOrder;
use crate::error::ClosureTreeError;
use crate::repository::ClosureTreeRepository;
use crate::traits::ClosureTreeModel;

impl<M> ClosureTreeRepository<M>
where
    M: ClosureTreeModel,
{
    /// Recomputes the ancestor rows of `node` from its current parent pointer.
    pub async fn perfect_node<C>(&self, conn: &C, node: &M) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.perfect_node_on(guard.connection(), &node.id()).await;
        guard.finish(result).await
    }

    /// Perfects every node, parents before children. The first failure rolls
    /// back the whole sweep and is reported with the node it stopped at.
    pub async fn perfect_forest<C>(&self, conn: &C) -> Result<usize, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.perfect_forest_on(guard.connection()).await;
        guard.finish(result).await
    }

    /// Perfects the strict descendants of `node`, following parent pointers.
    pub async fn perfect_subtree<C>(&self, conn: &C, node: &M) -> Result<usize, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.perfect_subtree_on(guard.connection(), &node.id()).await;
        guard.finish(result).await
    }

    /// Deletes closure rows pointing at entities that no longer exist, or that
    /// are soft-deleted when a soft-delete column is configured.
    pub async fn prune_redundant<C>(&self, conn: &C) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let mut live = Condition::all();
        if let Some(column) = self.config().soft_delete_column() {
            live = live.add(Expr::col(Alias::new(column)).is_null());
        }
        self.prune_redundant_with(conn, live).await
    }

    /// Like [`prune_redundant`](Self::prune_redundant) with a caller-supplied
    /// condition selecting the live entity rows.
    pub async fn prune_redundant_with<C>(
        &self,
        conn: &C,
        live: Condition,
    ) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.prune_on(guard.connection(), live).await;
        guard.finish(result).await
    }

    async fn perfect_node_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<u64, ClosureTreeError> {
        let node = self.require_node(conn, id).await?;
        self.reconcile_on(conn, id, node.parent_id().as_ref()).await
    }

    async fn perfect_forest_on<C: ConnectionTrait>(&self, conn: &C) -> Result<usize, ClosureTreeError> {
        let forest = self.forest(conn).await?;
        let perfected = self.rebuild_walk_on(conn, PreOrder::forest(&forest)).await?;
        tracing::info!("perfected {} nodes", perfected);
        Ok(perfected)
    }

    async fn perfect_subtree_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<usize, ClosureTreeError> {
        self.require_node(conn, id).await?;

        let forest = self.forest(conn).await?;
        let Some(subtree) = PreOrder::forest(&forest).find(|tree| &tree.node.id() == id) else {
            return Ok(0);
        };

        let perfected = self
            .rebuild_walk_on(conn, PreOrder::forest(&subtree.children))
            .await?;
        tracing::info!("perfected {} descendants of node {:?}", perfected, id);
        Ok(perfected)
    }

    async fn prune_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        live: Condition,
    ) -> Result<u64, ClosureTreeError> {
        let live_ids = M::Entity::find()
            .select_only()
            .column(M::id_column())
            .filter(live)
            .into_query();

        let orphaned = Condition::any()
            .add(M::closure_ancestor_column().not_in_subquery(live_ids.clone()))
            .add(M::closure_descendant_column().not_in_subquery(live_ids));

        let pruned = self.store.delete_where(conn, orphaned).await?;
        tracing::info!("pruned {} redundant closure rows", pruned);
        Ok(pruned)
    }
}
