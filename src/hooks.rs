//! Entry points for a host's entity lifecycle.
//!
//! The host calls these at the matching moments of its own save/delete
//! flow, typically on the transaction it is already using; each hook then
//! runs inside a savepoint of that transaction.

use sea_orm::{ConnectionTrait, TransactionTrait};

use crate::error::ClosureTreeError;
use crate::repository::ClosureTreeRepository;
use crate::traits::ClosureTreeModel;

impl<M> ClosureTreeRepository<M>
where
    M: ClosureTreeModel,
{
    /// After a new entity row was inserted with its parent pointer.
    pub async fn after_insert<C>(&self, conn: &C, model: &M) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        self.insert_closure(conn, &model.id(), model.parent_id().as_ref())
            .await
    }

    /// Before `updated` is written. When its parent pointer differs from the
    /// stored one the subtree's closure rows are moved; the host still
    /// persists the pointer. Returns whether the closure changed.
    pub async fn before_update<C>(&self, conn: &C, updated: &M) -> Result<bool, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self.before_update_on(guard.connection(), updated).await;
        guard.finish(result).await
    }

    /// Before the entity row of `model` is deleted.
    pub async fn before_delete<C>(&self, conn: &C, model: &M) -> Result<(), ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        self.delete_with_reparent_to_root(conn, model).await
    }

    /// After a soft-deleted entity was restored.
    pub async fn after_restore<C>(&self, conn: &C, model: &M) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let guard = self.begin(conn).await?;
        let result = self
            .reconcile_on(guard.connection(), &model.id(), model.parent_id().as_ref())
            .await;
        guard.finish(result).await
    }

    async fn before_update_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        updated: &M,
    ) -> Result<bool, ClosureTreeError> {
        let stored = self.require_node(conn, &updated.id()).await?;
        let parent = updated.parent_id();
        if stored.parent_id() == parent {
            return Ok(false);
        }

        self.reattach_on(conn, &stored, parent.as_ref()).await?;
        Ok(true)
    }
}
