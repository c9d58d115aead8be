use crc32fast::Hasher;

/// Static configuration describing how a SeaORM model integrates with
/// its closure table.
#[derive(Clone, Debug)]
pub struct ClosureTreeConfig {
    entity_name: String,
    closure_name: String,
    parent_column: String,
    closure_table: String,
    ancestor_column: String,
    descendant_column: String,
    distance_column: String,
    root_sentinel: RootSentinel,
    soft_delete_column: Option<String>,
    order_strategy: Option<OrderStrategy>,
    advisory_lock_strategy: AdvisoryLockStrategy,
}

impl ClosureTreeConfig {
    /// Create a new configuration using the logical entity and closure names.
    pub fn new(entity_name: impl Into<String>, closure_name: impl Into<String>) -> Self {
        let entity_name = entity_name.into();
        let closure_name = closure_name.into();

        let default_lock = AdvisoryLockStrategy::Namespaced(AdvisoryLockKey::derived_from(
            &entity_name,
            &closure_name,
        ));

        Self {
            entity_name,
            closure_name,
            parent_column: "pid".to_string(),
            closure_table: String::new(),
            ancestor_column: "ancestor".to_string(),
            descendant_column: "descendant".to_string(),
            distance_column: "distance".to_string(),
            root_sentinel: RootSentinel::default(),
            soft_delete_column: None,
            order_strategy: None,
            advisory_lock_strategy: default_lock,
        }
    }

    /// Merge options produced by [`ClosureTreeOptions`].
    pub(crate) fn apply_options(mut self, options: ClosureTreeOptions) -> Self {
        if let Some(parent_column) = options.parent_column {
            self.parent_column = parent_column;
        }
        if let Some(closure_table) = options.closure_table {
            self.closure_table = closure_table;
        }
        if let Some(column) = options.ancestor_column {
            self.ancestor_column = column;
        }
        if let Some(column) = options.descendant_column {
            self.descendant_column = column;
        }
        if let Some(column) = options.distance_column {
            self.distance_column = column;
        }
        if let Some(sentinel) = options.root_sentinel {
            self.root_sentinel = sentinel;
        }
        if let Some(column) = options.soft_delete_column {
            self.soft_delete_column = Some(column);
        }
        if let Some(order_strategy) = options.order_strategy {
            self.order_strategy = Some(order_strategy);
        }
        if let Some(strategy) = options.advisory_lock_strategy {
            self.advisory_lock_strategy = strategy;
        }
        self
    }

    /// Human-readable Rust struct name for the base entity.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Associated SeaORM entity name for the closure model.
    pub fn closure_name(&self) -> &str {
        &self.closure_name
    }

    /// Column name storing the parent pointer.
    pub fn parent_column(&self) -> &str {
        &self.parent_column
    }

    /// Table backing the closure entity.
    pub fn closure_table(&self) -> &str {
        &self.closure_table
    }

    pub fn ancestor_column(&self) -> &str {
        &self.ancestor_column
    }

    pub fn descendant_column(&self) -> &str {
        &self.descendant_column
    }

    pub fn distance_column(&self) -> &str {
        &self.distance_column
    }

    /// How a root is encoded in the parent column.
    pub fn root_sentinel(&self) -> RootSentinel {
        self.root_sentinel
    }

    /// Nullable timestamp column marking soft-deleted rows, if any.
    pub fn soft_delete_column(&self) -> Option<&str> {
        self.soft_delete_column.as_deref()
    }

    /// Ordering strategy to apply when returning children and roots.
    pub fn order_strategy(&self) -> Option<&OrderStrategy> {
        self.order_strategy.as_ref()
    }

    /// Advisory lock strategy (PostgreSQL only).
    pub fn advisory_lock_strategy(&self) -> &AdvisoryLockStrategy {
        &self.advisory_lock_strategy
    }
}

/// Builder-style options consumed by the derive macro.
#[derive(Clone, Debug, Default)]
pub struct ClosureTreeOptions {
    parent_column: Option<String>,
    closure_table: Option<String>,
    ancestor_column: Option<String>,
    descendant_column: Option<String>,
    distance_column: Option<String>,
    root_sentinel: Option<RootSentinel>,
    soft_delete_column: Option<String>,
    order_strategy: Option<OrderStrategy>,
    advisory_lock_strategy: Option<AdvisoryLockStrategy>,
}

impl ClosureTreeOptions {
    pub fn parent_column(mut self, value: impl Into<String>) -> Self {
        self.parent_column = Some(value.into());
        self
    }

    pub fn closure_table(mut self, value: impl Into<String>) -> Self {
        self.closure_table = Some(value.into());
        self
    }

    pub fn ancestor_column(mut self, value: impl Into<String>) -> Self {
        self.ancestor_column = Some(value.into());
        self
    }

    pub fn descendant_column(mut self, value: impl Into<String>) -> Self {
        self.descendant_column = Some(value.into());
        self
    }

    pub fn distance_column(mut self, value: impl Into<String>) -> Self {
        self.distance_column = Some(value.into());
        self
    }

    pub fn root_sentinel(mut self, sentinel: RootSentinel) -> Self {
        self.root_sentinel = Some(sentinel);
        self
    }

    pub fn soft_delete_column(mut self, value: impl Into<String>) -> Self {
        self.soft_delete_column = Some(value.into());
        self
    }

    pub fn order_strategy(mut self, strategy: OrderStrategy) -> Self {
        self.order_strategy = Some(strategy);
        self
    }

    pub fn advisory_lock_strategy(mut self, strategy: AdvisoryLockStrategy) -> Self {
        self.advisory_lock_strategy = Some(strategy);
        self
    }

    pub fn apply(self, base: ClosureTreeConfig) -> ClosureTreeConfig {
        base.apply_options(self)
    }
}

/// Encoding of "no parent" in the parent column.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RootSentinel {
    /// Roots store `NULL`.
    #[default]
    Null,
    /// Roots store `0`; `NULL` is still read as a root.
    Zero,
}

/// Strategy used to generate deterministic ordering.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OrderStrategy {
    Manual,
    NumericColumn { column: String },
}

impl OrderStrategy {
    pub fn numeric_column(column: impl Into<String>) -> Self {
        Self::NumericColumn {
            column: column.into(),
        }
    }
}

/// Key used for PostgreSQL advisory locks.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AdvisoryLockKey(String);

impl AdvisoryLockKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn derived_from(entity: &str, closure: &str) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(entity.as_bytes());
        hasher.update(b"/");
        hasher.update(closure.as_bytes());
        let crc = hasher.finalize();
        Self(format!("closure-table::{entity}::{closure}::{crc:x}"))
    }
}

/// Configuration describing how to acquire advisory locks around mutations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdvisoryLockStrategy {
    Disabled,
    Namespaced(AdvisoryLockKey),
}

impl AdvisoryLockStrategy {
    pub fn key(&self) -> Option<&AdvisoryLockKey> {
        match self {
            AdvisoryLockStrategy::Disabled => None,
            AdvisoryLockStrategy::Namespaced(key) => Some(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_closure_table_conventions() {
        let config = ClosureTreeConfig::new("Category", "CategoryClosure");

        assert_eq!(config.parent_column(), "pid");
        assert_eq!(config.ancestor_column(), "ancestor");
        assert_eq!(config.descendant_column(), "descendant");
        assert_eq!(config.distance_column(), "distance");
        assert_eq!(config.root_sentinel(), RootSentinel::Null);
        assert!(config.soft_delete_column().is_none());
    }

    #[test]
    fn options_override_defaults() {
        let config = ClosureTreeOptions::default()
            .parent_column("parent_id")
            .closure_table("category_paths")
            .ancestor_column("up")
            .descendant_column("down")
            .distance_column("hops")
            .root_sentinel(RootSentinel::Zero)
            .soft_delete_column("deleted_at")
            .advisory_lock_strategy(AdvisoryLockStrategy::Disabled)
            .apply(ClosureTreeConfig::new("Category", "CategoryClosure"));

        assert_eq!(config.parent_column(), "parent_id");
        assert_eq!(config.closure_table(), "category_paths");
        assert_eq!(config.ancestor_column(), "up");
        assert_eq!(config.descendant_column(), "down");
        assert_eq!(config.distance_column(), "hops");
        assert_eq!(config.root_sentinel(), RootSentinel::Zero);
        assert_eq!(config.soft_delete_column(), Some("deleted_at"));
        assert!(config.advisory_lock_strategy().key().is_none());
    }

    #[test]
    fn lock_key_is_stable_per_entity_pair() {
        let a = ClosureTreeConfig::new("Category", "CategoryClosure");
        let b = ClosureTreeConfig::new("Category", "CategoryClosure");
        let c = ClosureTreeConfig::new("Menu", "MenuClosure");

        let key_a = a.advisory_lock_strategy().key().map(AdvisoryLockKey::as_str);
        let key_b = b.advisory_lock_strategy().key().map(AdvisoryLockKey::as_str);
        let key_c = c.advisory_lock_strategy().key().map(AdvisoryLockKey::as_str);

        assert_eq!(key_a, key_b);
        assert_ne!(key_a, key_c);
        assert!(key_a.is_some_and(|key| key.starts_with("closure-table::Category::")));
    }
}
