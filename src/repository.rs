use std::collections::HashMap;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Select,
    TransactionTrait,
};

use crate::config::{ClosureTreeConfig, OrderStrategy, RootSentinel};
use crate::error::ClosureTreeError;
use crate::lock::LockedTransaction;
use crate::store::ClosureStore;
use crate::traits::ClosureTreeModel;

/// Upper bound on ids bound into one `IN (...)` list.
const ID_BATCH: usize = 1_000;

/// Repository exposing the closure-table operations for a given model.
///
/// The operations are split by concern: mutations live in `mutator`,
/// reads in `query`, nested-tree handling in `builder` and self-healing in
/// `repair`. Reads accept any [`ConnectionTrait`]; mutations additionally
/// need [`TransactionTrait`] and run as one unit.
#[derive(Debug, Default)]
pub struct ClosureTreeRepository<M>
where
    M: ClosureTreeModel,
{
    pub(crate) store: ClosureStore<M>,
}

impl<M> ClosureTreeRepository<M>
where
    M: ClosureTreeModel,
{
    pub fn new() -> Self {
        Self {
            store: ClosureStore::new(),
        }
    }

    /// Direct access to the closure relation.
    pub fn store(&self) -> &ClosureStore<M> {
        &self.store
    }

    pub(crate) fn config(&self) -> &'static ClosureTreeConfig {
        M::closure_tree_config()
    }

    pub(crate) async fn begin<C>(&self, conn: &C) -> Result<LockedTransaction, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        LockedTransaction::acquire(self.config().advisory_lock_strategy(), conn).await
    }

    pub(crate) async fn find_node<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Option<M>, ClosureTreeError> {
        let model = M::Entity::find()
            .filter(M::id_column().eq(M::id_to_value(id)))
            .one(conn)
            .await?;
        Ok(model)
    }

    /// Re-reads a node, failing with `NotPersisted` when its row is gone.
    pub(crate) async fn require_node<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<M, ClosureTreeError> {
        self.find_node(conn, id)
            .await?
            .ok_or_else(|| ClosureTreeError::not_persisted(id))
    }

    pub(crate) fn root_condition(&self) -> Condition {
        let condition = Condition::any().add(M::parent_column().is_null());
        match self.config().root_sentinel() {
            RootSentinel::Null => condition,
            RootSentinel::Zero => condition.add(M::parent_column().eq(0)),
        }
    }

    pub(crate) fn ordered(&self, mut query: Select<M::Entity>) -> Select<M::Entity> {
        if let Some(OrderStrategy::NumericColumn { column }) = self.config().order_strategy() {
            query = query.order_by_asc(Expr::cust(column.clone()));
        }
        query.order_by_asc(M::id_column())
    }

    pub(crate) async fn children_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M>, ClosureTreeError> {
        let query = M::Entity::find().filter(M::parent_column().eq(M::id_to_value(id)));
        let rows = self.ordered(query).all(conn).await?;
        Ok(rows)
    }

    pub(crate) async fn roots_on<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Vec<M>, ClosureTreeError> {
        let query = M::Entity::find().filter(self.root_condition());
        let rows = self.ordered(query).all(conn).await?;
        Ok(rows)
    }

    pub(crate) async fn all_nodes<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Vec<M>, ClosureTreeError> {
        let rows = self.ordered(M::Entity::find()).all(conn).await?;
        Ok(rows)
    }

    /// Loads the given ids keeping their order; ids without a row are skipped.
    pub(crate) async fn models_by_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        ids: &[M::Id],
    ) -> Result<Vec<M>, ClosureTreeError> {
        let mut by_id = HashMap::with_capacity(ids.len());
        for batch in ids.chunks(ID_BATCH) {
            let values = batch.iter().map(M::id_to_value).collect::<Vec<_>>();
            let rows = M::Entity::find()
                .filter(M::id_column().is_in(values))
                .all(conn)
                .await?;
            by_id.extend(rows.into_iter().map(|model| (model.id(), model)));
        }

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Entities matching `condition`, in the configured entity order.
    pub(crate) async fn models_where<C: ConnectionTrait>(
        &self,
        conn: &C,
        condition: Condition,
    ) -> Result<Vec<M>, ClosureTreeError> {
        let query = M::Entity::find().filter(condition);
        let rows = self.ordered(query).all(conn).await?;
        Ok(rows)
    }
}
