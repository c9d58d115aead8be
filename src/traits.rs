use std::fmt::Debug;
use std::hash::Hash;

use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, EntityTrait, FromQueryResult, IntoActiveModel, Value,
};

use crate::config::ClosureTreeConfig;

/// Trait implemented by SeaORM `Model` types whose hierarchy is indexed by a
/// closure table.
///
/// Implementations are normally provided by the `#[derive(ClosureTreeModel)]` macro.
pub trait ClosureTreeModel:
    Clone + Send + Sync + 'static + IntoActiveModel<Self::ActiveModel> + FromQueryResult
{
    type Entity: EntityTrait<Model = Self>;
    type ActiveModel: ActiveModelTrait<Entity = Self::Entity> + ActiveModelBehavior + Send;
    type Id: Clone + Debug + Eq + Hash + Send + Sync + 'static;

    type ClosureEntity: EntityTrait<Model = Self::ClosureModel>;
    type ClosureModel: Clone
        + Send
        + Sync
        + 'static
        + FromQueryResult
        + IntoActiveModel<Self::ClosureActiveModel>;
    type ClosureActiveModel: ActiveModelTrait<Entity = Self::ClosureEntity>
        + ActiveModelBehavior
        + Send;

    fn closure_tree_config() -> &'static ClosureTreeConfig;

    fn id(&self) -> Self::Id;
    /// Parent pointer, `None` for roots (whatever the stored sentinel).
    fn parent_id(&self) -> Option<Self::Id>;
    /// Writes the parent pointer; `None` stores the configured root sentinel.
    fn set_parent(active: &mut Self::ActiveModel, parent: Option<Self::Id>);
    fn id_to_value(id: &Self::Id) -> Value;

    fn parent_column() -> <Self::Entity as EntityTrait>::Column;
    fn id_column() -> <Self::Entity as EntityTrait>::Column;

    fn closure_ancestor_column() -> <Self::ClosureEntity as EntityTrait>::Column;
    fn closure_descendant_column() -> <Self::ClosureEntity as EntityTrait>::Column;
    fn closure_distance_column() -> <Self::ClosureEntity as EntityTrait>::Column;

    fn closure_id_to_value(id: &Self::Id) -> Value;
    fn closure_model_ancestor(model: &Self::ClosureModel) -> Self::Id;
    fn closure_model_descendant(model: &Self::ClosureModel) -> Self::Id;
    fn closure_model_distance(model: &Self::ClosureModel) -> i32;
    fn closure_build_row(
        ancestor: Self::Id,
        descendant: Self::Id,
        distance: i32,
    ) -> Self::ClosureActiveModel;
}
