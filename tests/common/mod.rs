#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};

use closure_table::ClosureTreeRepository;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectOptions, Database, DatabaseConnection, DbBackend, Statement};

pub mod entity {
    pub mod node {
        use closure_table::ClosureTreeModelDerive as ClosureTreeModel;
        use sea_orm::entity::prelude::*;
        use serde::Serialize;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, ClosureTreeModel, Serialize)]
        #[sea_orm(table_name = "nodes")]
        #[closure_tree(
            closure_module = "crate::common::entity::node_closure",
            soft_delete_column = "deleted_at"
        )]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub pid: Option<i32>,
            pub name: String,
            pub deleted_at: Option<String>,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod node_closure {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "nodes_closure")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub ancestor: i32,
            #[sea_orm(primary_key, auto_increment = false)]
            pub descendant: i32,
            pub distance: i32,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}

pub use entity::node;

pub type Repo = ClosureTreeRepository<node::Model>;
pub type Edges = BTreeSet<(i32, i32, i32)>;

const SQLITE_SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE nodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pid INTEGER NULL,
        name TEXT NOT NULL,
        deleted_at TEXT NULL
    );
    "#,
    r#"
    CREATE TABLE nodes_closure (
        ancestor INTEGER NOT NULL,
        descendant INTEGER NOT NULL,
        distance INTEGER NOT NULL,
        PRIMARY KEY (ancestor, descendant)
    );
    "#,
];

/// Fresh in-memory SQLite database with the node tables.
///
/// A single pooled connection keeps the in-memory database alive and shared.
pub async fn setup_sqlite() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    for sql in SQLITE_SCHEMA {
        db.execute(Statement::from_string(DbBackend::Sqlite, sql))
            .await?;
    }

    Ok(db)
}

pub fn named(name: &str) -> node::ActiveModel {
    node::ActiveModel {
        name: Set(name.to_owned()),
        ..Default::default()
    }
}

pub async fn create<C>(
    conn: &C,
    repo: &Repo,
    name: &str,
    parent: Option<&node::Model>,
) -> Result<node::Model, closure_table::ClosureTreeError>
where
    C: sea_orm::ConnectionTrait + sea_orm::TransactionTrait,
{
    match parent {
        Some(parent) => repo.create_child(conn, parent, named(name)).await,
        None => repo.create_root(conn, named(name)).await,
    }
}

/// Builds `1 -> 2 -> 4`, `1 -> 3` and returns the nodes by id.
pub async fn scenario(
    db: &DatabaseConnection,
    repo: &Repo,
) -> Result<HashMap<i32, node::Model>, closure_table::ClosureTreeError> {
    let n1 = create(db, repo, "n1", None).await?;
    let n2 = create(db, repo, "n2", Some(&n1)).await?;
    let n3 = create(db, repo, "n3", Some(&n1)).await?;
    let n4 = create(db, repo, "n4", Some(&n2)).await?;

    Ok([n1, n2, n3, n4]
        .into_iter()
        .map(|node| (node.id, node))
        .collect())
}

pub async fn reload(db: &DatabaseConnection, id: i32) -> Result<node::Model, DbErr> {
    node::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("node {id}")))
}

pub async fn edges(
    db: &DatabaseConnection,
    repo: &Repo,
) -> Result<Edges, closure_table::ClosureTreeError> {
    let edges = repo.store().all_edges(db).await?;
    Ok(edges
        .into_iter()
        .map(|edge| (edge.ancestor, edge.descendant, edge.distance))
        .collect())
}

/// Closure implied by the parent pointers of `nodes`.
pub fn expected_closure(nodes: &[node::Model]) -> Edges {
    let parents: HashMap<i32, Option<i32>> = nodes
        .iter()
        .map(|node| (node.id, node.pid.filter(|pid| *pid != 0)))
        .collect();

    let mut closure = BTreeSet::new();
    for node in nodes {
        let mut current = Some(node.id);
        let mut distance = 0;
        while let Some(ancestor) = current {
            closure.insert((ancestor, node.id, distance));
            current = parents.get(&ancestor).copied().flatten();
            distance += 1;
            assert!(distance <= nodes.len() as i32, "parent cycle at {}", node.id);
        }
    }
    closure
}

pub async fn assert_closure_exact(
    db: &DatabaseConnection,
    repo: &Repo,
) -> Result<(), Box<dyn std::error::Error>> {
    let nodes = node::Entity::find().all(db).await?;
    let expected = expected_closure(&nodes);
    let actual = edges(db, repo).await?;
    assert_eq!(actual, expected, "closure table diverged from parent pointers");
    Ok(())
}

pub fn ids(nodes: &[node::Model]) -> Vec<i32> {
    nodes.iter().map(|node| node.id).collect()
}

pub fn sorted_ids(nodes: &[node::Model]) -> Vec<i32> {
    let mut ids = ids(nodes);
    ids.sort_unstable();
    ids
}
