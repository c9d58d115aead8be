use std::marker::PhantomData;

use sea_orm::sea_query::{Alias, Expr, InsertStatement, JoinType, Query, SelectStatement};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityName, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, QueryTrait,
};
use serde::Serialize;

use crate::error::ClosureTreeError;
use crate::traits::ClosureTreeModel;

/// One row of the closure relation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ClosureEdge<Id> {
    pub ancestor: Id,
    pub descendant: Id,
    pub distance: i32,
}

impl<Id> ClosureEdge<Id> {
    pub fn new(ancestor: Id, descendant: Id, distance: i32) -> Self {
        Self {
            ancestor,
            descendant,
            distance,
        }
    }
}

/// Set-oriented access to the closure relation of `M`.
///
/// Every method takes the connection explicitly so the same calls run on a
/// plain connection, a transaction or a savepoint.
#[derive(Debug, Default)]
pub struct ClosureStore<M>
where
    M: ClosureTreeModel,
{
    _marker: PhantomData<M>,
}

impl<M> ClosureStore<M>
where
    M: ClosureTreeModel,
{
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// Rows whose descendant is `id`, nearest ancestor first.
    pub async fn ancestor_edges<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
        include_self: bool,
    ) -> Result<Vec<ClosureEdge<M::Id>>, ClosureTreeError> {
        let mut query = M::ClosureEntity::find()
            .filter(M::closure_descendant_column().eq(M::closure_id_to_value(id)));

        if !include_self {
            query = query.filter(M::closure_distance_column().gt(0));
        }

        let rows = query
            .order_by_asc(M::closure_distance_column())
            .all(conn)
            .await?;
        Ok(rows.iter().map(Self::edge_from_model).collect())
    }

    /// Rows whose ancestor is `id`, nearest descendant first.
    pub async fn descendant_edges<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
        include_self: bool,
    ) -> Result<Vec<ClosureEdge<M::Id>>, ClosureTreeError> {
        let mut query = M::ClosureEntity::find()
            .filter(M::closure_ancestor_column().eq(M::closure_id_to_value(id)));

        if !include_self {
            query = query.filter(M::closure_distance_column().gt(0));
        }

        let rows = query
            .order_by_asc(M::closure_distance_column())
            .order_by_asc(M::closure_descendant_column())
            .all(conn)
            .await?;
        Ok(rows.iter().map(Self::edge_from_model).collect())
    }

    pub async fn has_self_edge<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<bool, ClosureTreeError> {
        self.has_edge(conn, id, id).await
    }

    /// Whether `descendant` is `ancestor` or lies below it.
    pub async fn has_edge<C: ConnectionTrait>(
        &self,
        conn: &C,
        ancestor: &M::Id,
        descendant: &M::Id,
    ) -> Result<bool, ClosureTreeError> {
        let row = M::ClosureEntity::find()
            .filter(M::closure_ancestor_column().eq(M::closure_id_to_value(ancestor)))
            .filter(M::closure_descendant_column().eq(M::closure_id_to_value(descendant)))
            .one(conn)
            .await?;
        Ok(row.is_some())
    }

    /// `SELECT ancestor FROM closure WHERE descendant = id`, kept in the
    /// database as a subquery.
    pub fn ancestor_ids_query(&self, id: &M::Id, include_self: bool) -> SelectStatement {
        let mut query = M::ClosureEntity::find()
            .select_only()
            .column(M::closure_ancestor_column())
            .filter(M::closure_descendant_column().eq(M::closure_id_to_value(id)));
        if !include_self {
            query = query.filter(M::closure_distance_column().gt(0));
        }
        query.into_query()
    }

    /// `SELECT descendant FROM closure WHERE ancestor = id`, kept in the
    /// database as a subquery.
    pub fn descendant_ids_query(&self, id: &M::Id, include_self: bool) -> SelectStatement {
        let mut query = M::ClosureEntity::find()
            .select_only()
            .column(M::closure_descendant_column())
            .filter(M::closure_ancestor_column().eq(M::closure_id_to_value(id)));
        if !include_self {
            query = query.filter(M::closure_distance_column().gt(0));
        }
        query.into_query()
    }

    /// Copies every ancestor-or-self row of `parent` onto `id`, one hop
    /// further away, with a single `INSERT ... SELECT`.
    pub async fn copy_ancestors_to<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
        parent: &M::Id,
    ) -> Result<u64, ClosureTreeError> {
        let select = Query::select()
            .column(M::closure_ancestor_column())
            .expr(Expr::value(M::closure_id_to_value(id)))
            .expr(Expr::col(M::closure_distance_column()).add(1))
            .from(M::ClosureEntity::default().table_ref())
            .and_where(M::closure_descendant_column().eq(M::closure_id_to_value(parent)))
            .to_owned();

        self.insert_select(conn, select).await
    }

    /// Joins the ancestor-or-self rows of `parent` with the descendant-or-self
    /// rows of `id` and inserts the product in one `INSERT ... SELECT`.
    pub async fn cross_join_insert<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
        parent: &M::Id,
    ) -> Result<u64, ClosureTreeError> {
        let above = Alias::new("above");
        let below = Alias::new("below");
        let table = M::ClosureEntity::default().table_ref();

        let select = Query::select()
            .expr(Expr::col((above.clone(), M::closure_ancestor_column())))
            .expr(Expr::col((below.clone(), M::closure_descendant_column())))
            .expr(
                Expr::col((above.clone(), M::closure_distance_column()))
                    .add(Expr::col((below.clone(), M::closure_distance_column())))
                    .add(1),
            )
            .from_as(table.clone(), above.clone())
            .join_as(
                JoinType::InnerJoin,
                table,
                below.clone(),
                Expr::col((below, M::closure_ancestor_column()))
                    .eq(M::closure_id_to_value(id)),
            )
            .and_where(
                Expr::col((above, M::closure_descendant_column()))
                    .eq(M::closure_id_to_value(parent)),
            )
            .to_owned();

        self.insert_select(conn, select).await
    }

    /// Writes `edges` as a single multi-row insert.
    pub async fn insert_edges<C: ConnectionTrait>(
        &self,
        conn: &C,
        edges: Vec<ClosureEdge<M::Id>>,
    ) -> Result<u64, ClosureTreeError> {
        if edges.is_empty() {
            return Ok(0);
        }

        let rows = edges
            .into_iter()
            .map(|edge| M::closure_build_row(edge.ancestor, edge.descendant, edge.distance));

        let inserted = M::ClosureEntity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(inserted)
    }

    pub async fn delete_where<C: ConnectionTrait>(
        &self,
        conn: &C,
        condition: Condition,
    ) -> Result<u64, ClosureTreeError> {
        let result = M::ClosureEntity::delete_many()
            .filter(condition)
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// The whole relation ordered by `(ancestor, descendant)`.
    pub async fn all_edges<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Vec<ClosureEdge<M::Id>>, ClosureTreeError> {
        let rows = M::ClosureEntity::find()
            .order_by_asc(M::closure_ancestor_column())
            .order_by_asc(M::closure_descendant_column())
            .all(conn)
            .await?;
        Ok(rows.iter().map(Self::edge_from_model).collect())
    }

    async fn insert_select<C: ConnectionTrait>(
        &self,
        conn: &C,
        select: SelectStatement,
    ) -> Result<u64, ClosureTreeError> {
        let insert = Query::insert()
            .into_table(M::ClosureEntity::default().table_ref())
            .columns([
                M::closure_ancestor_column(),
                M::closure_descendant_column(),
                M::closure_distance_column(),
            ])
            .select_from(select)
            .map_err(|err| DbErr::Custom(err.to_string()))?
            .to_owned();

        let inserted = self.execute(conn, &insert).await?;
        Ok(inserted)
    }

    async fn execute<C: ConnectionTrait>(
        &self,
        conn: &C,
        insert: &InsertStatement,
    ) -> Result<u64, DbErr> {
        let statement = conn.get_database_backend().build(insert);
        let result = conn.execute(statement).await?;
        Ok(result.rows_affected())
    }

    fn edge_from_model(model: &M::ClosureModel) -> ClosureEdge<M::Id> {
        ClosureEdge::new(
            M::closure_model_ancestor(model),
            M::closure_model_descendant(model),
            M::closure_model_distance(model),
        )
    }
}
