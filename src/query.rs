use std::collections::HashSet;
use std::hash::Hash;

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, QueryTrait,
};

use crate::error::ClosureTreeError;
use crate::repository::ClosureTreeRepository;
use crate::traits::ClosureTreeModel;

/// Members of `ordered` absent from `excluded`, order kept.
fn difference<T: Eq + Hash>(ordered: Vec<T>, excluded: &HashSet<T>) -> Vec<T> {
    ordered
        .into_iter()
        .filter(|item| !excluded.contains(item))
        .collect()
}

fn contains<T: PartialEq>(set: &[T], item: &T) -> bool {
    set.iter().any(|member| member == item)
}

impl<M> ClosureTreeRepository<M>
where
    M: ClosureTreeModel,
{
    pub async fn ancestor_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M::Id>, ClosureTreeError> {
        let edges = self.store.ancestor_edges(conn, id, false).await?;
        Ok(edges.into_iter().map(|edge| edge.ancestor).collect())
    }

    pub async fn ancestor_and_self_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M::Id>, ClosureTreeError> {
        let edges = self.store.ancestor_edges(conn, id, true).await?;
        Ok(edges.into_iter().map(|edge| edge.ancestor).collect())
    }

    pub async fn descendant_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M::Id>, ClosureTreeError> {
        let edges = self.store.descendant_edges(conn, id, false).await?;
        Ok(edges.into_iter().map(|edge| edge.descendant).collect())
    }

    pub async fn descendant_and_self_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M::Id>, ClosureTreeError> {
        let edges = self.store.descendant_edges(conn, id, true).await?;
        Ok(edges.into_iter().map(|edge| edge.descendant).collect())
    }

    /// Ancestors of `model`, nearest first.
    pub async fn ancestors<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, ClosureTreeError> {
        let ids = self.ancestor_ids(conn, &model.id()).await?;
        self.models_by_ids(conn, &ids).await
    }

    pub async fn ancestors_and_self<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, ClosureTreeError> {
        let ids = self.ancestor_and_self_ids(conn, &model.id()).await?;
        self.models_by_ids(conn, &ids).await
    }

    /// Descendants of `model`, nearest generation first.
    pub async fn descendants<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, ClosureTreeError> {
        let ids = self.descendant_ids(conn, &model.id()).await?;
        self.models_by_ids(conn, &ids).await
    }

    pub async fn descendants_and_self<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, ClosureTreeError> {
        let ids = self.descendant_and_self_ids(conn, &model.id()).await?;
        self.models_by_ids(conn, &ids).await
    }

    pub async fn parent<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Option<M>, ClosureTreeError> {
        match model.parent_id() {
            Some(parent_id) => self.find_node(conn, &parent_id).await,
            None => Ok(None),
        }
    }

    pub async fn children<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, ClosureTreeError> {
        self.children_of(conn, &model.id()).await
    }

    pub async fn child_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M::Id>, ClosureTreeError> {
        let children = self.children_of(conn, id).await?;
        Ok(children.iter().map(M::id).collect())
    }

    pub async fn roots<C: ConnectionTrait>(&self, conn: &C) -> Result<Vec<M>, ClosureTreeError> {
        self.roots_on(conn).await
    }

    /// The topmost ancestor of `model`; a root is its own root.
    pub async fn root<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Option<M>, ClosureTreeError> {
        let path = self.store.ancestor_ids_query(&model.id(), true);
        let root = M::Entity::find()
            .filter(M::id_column().in_subquery(path))
            .filter(self.root_condition())
            .one(conn)
            .await?;
        Ok(root)
    }

    pub async fn siblings<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, ClosureTreeError> {
        let id = model.id();
        let peers = self.peers(conn, &id).await?;
        Ok(peers.into_iter().filter(|peer| peer.id() != id).collect())
    }

    pub async fn siblings_and_self<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, ClosureTreeError> {
        self.peers(conn, &model.id()).await
    }

    pub async fn sibling_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M::Id>, ClosureTreeError> {
        let peers = self.peers(conn, id).await?;
        Ok(peers
            .iter()
            .map(M::id)
            .filter(|peer| peer != id)
            .collect())
    }

    /// Children of the node's current parent, or every root for a root.
    async fn peers<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M>, ClosureTreeError> {
        let current = self.require_node(conn, id).await?;
        match current.parent_id() {
            Some(parent_id) => self.children_of(conn, &parent_id).await,
            None => self.roots_on(conn).await,
        }
    }

    /// Everything in the node's tree outside the node's own subtree.
    pub async fn besides<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, ClosureTreeError> {
        let ids = self.beside_ids(conn, &model.id()).await?;
        self.models_by_ids(conn, &ids).await
    }

    pub async fn beside_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M::Id>, ClosureTreeError> {
        let root_id = self.root_id_of(conn, id).await?;

        let tree = self.descendant_and_self_ids(conn, &root_id).await?;
        let subtree: HashSet<M::Id> = self
            .descendant_and_self_ids(conn, id)
            .await?
            .into_iter()
            .collect();

        Ok(difference(tree, &subtree))
    }

    /// Id of the root above `id`; an isolated node stands for its own root.
    pub(crate) async fn root_id_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<M::Id, ClosureTreeError> {
        let node = self.require_node(conn, id).await?;
        Ok(match self.root(conn, &node).await? {
            Some(root) => root.id(),
            None => node.id(),
        })
    }

    /// Entities without a self row in the closure table.
    pub async fn isolated<C: ConnectionTrait>(&self, conn: &C) -> Result<Vec<M>, ClosureTreeError> {
        let self_rows = M::ClosureEntity::find()
            .select_only()
            .column(M::closure_descendant_column())
            .filter(M::closure_distance_column().eq(0))
            .into_query();

        let query = M::Entity::find().filter(M::id_column().not_in_subquery(self_rows));
        let rows = self.ordered(query).all(conn).await?;
        Ok(rows)
    }

    pub async fn is_root<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<bool, ClosureTreeError> {
        let current = self.require_node(conn, &model.id()).await?;
        Ok(current.parent_id().is_none())
    }

    pub async fn is_leaf<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<bool, ClosureTreeError> {
        let child = M::Entity::find()
            .filter(M::parent_column().eq(M::id_to_value(&model.id())))
            .one(conn)
            .await?;
        Ok(child.is_none())
    }

    pub async fn is_isolated<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<bool, ClosureTreeError> {
        let has_self = self.store.has_self_edge(conn, &model.id()).await?;
        Ok(!has_self)
    }

    pub async fn is_parent_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        parent: &M,
        child: &M,
    ) -> Result<bool, ClosureTreeError> {
        let children = self.child_ids(conn, &parent.id()).await?;
        Ok(contains(&children, &child.id()))
    }

    pub async fn is_child_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        child: &M,
        parent: &M,
    ) -> Result<bool, ClosureTreeError> {
        self.is_parent_of(conn, parent, child).await
    }

    pub async fn is_ancestor_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        ancestor: &M,
        descendant: &M,
    ) -> Result<bool, ClosureTreeError> {
        let descendants = self.descendant_ids(conn, &ancestor.id()).await?;
        Ok(contains(&descendants, &descendant.id()))
    }

    pub async fn is_descendant_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        descendant: &M,
        ancestor: &M,
    ) -> Result<bool, ClosureTreeError> {
        let ancestors = self.ancestor_ids(conn, &descendant.id()).await?;
        Ok(contains(&ancestors, &ancestor.id()))
    }

    pub async fn is_sibling_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
        sibling: &M,
    ) -> Result<bool, ClosureTreeError> {
        let siblings = self.sibling_ids(conn, &model.id()).await?;
        Ok(contains(&siblings, &sibling.id()))
    }

    /// Whether `other` is in the same tree as `model` but outside its subtree.
    pub async fn is_beside_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
        other: &M,
    ) -> Result<bool, ClosureTreeError> {
        let besides = self.beside_ids(conn, &model.id()).await?;
        Ok(contains(&besides, &other.id()))
    }
}
