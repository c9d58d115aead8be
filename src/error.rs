use thiserror::Error;

/// Errors returned by the closure-table APIs.
#[derive(Debug, Error)]
pub enum ClosureTreeError {
    #[error("moving node {node} under {parent} would make it its own ancestor")]
    Cycle { node: String, parent: String },

    #[error("node {0} is not persisted")]
    NotPersisted(String),

    #[error("node {0} has no self row in the closure table")]
    NotANode(String),

    #[error("transaction failed: {0}")]
    Transaction(#[source] sea_orm::DbErr),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("repair aborted at node {node}: {source}")]
    Repair {
        node: String,
        #[source]
        source: Box<ClosureTreeError>,
    },
}

impl ClosureTreeError {
    pub fn cycle(node: &impl std::fmt::Debug, parent: &impl std::fmt::Debug) -> Self {
        Self::Cycle {
            node: format!("{node:?}"),
            parent: format!("{parent:?}"),
        }
    }

    pub fn not_persisted(id: &impl std::fmt::Debug) -> Self {
        Self::NotPersisted(format!("{id:?}"))
    }

    pub fn not_a_node(id: &impl std::fmt::Debug) -> Self {
        Self::NotANode(format!("{id:?}"))
    }

    pub fn repair(node: &impl std::fmt::Debug, source: ClosureTreeError) -> Self {
        Self::Repair {
            node: format!("{node:?}"),
            source: Box::new(source),
        }
    }
}
