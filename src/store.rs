//! Persistent store interface for role/permission data.
//!
//! The resolver only ever issues parameterized lookups through
//! [`AuthStore`]; no caller-provided text is spliced into a query. How an
//! implementation talks to its backend, including whether it opens one
//! connection per operation, is its own business.
use std::collections::HashMap;
use std::future::Future;
use uuid::Uuid;

/// Store access failure. Always the server's fault, never the caller's.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("store query failed: {0}")]
    Query(String),
}

/// Lookup surface over the role/permission graph.
///
/// Nodes are roles and permissions keyed by [`Uuid`], connected by
/// directed parent→child edges. Users hold direct grants to a set of
/// nodes.
pub trait AuthStore: Send + Sync {
    /// Names of the nodes directly granted to `user`.
    fn assigned_names(
        &self,
        user: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Ids of the nodes directly granted to `user`.
    fn assigned_ids(
        &self,
        user: &str,
    ) -> impl Future<Output = Result<Vec<Uuid>, StoreError>> + Send;

    /// One expansion step: every direct child of any node in `parents`.
    fn children_of(
        &self,
        parents: &[Uuid],
    ) -> impl Future<Output = Result<Vec<Uuid>, StoreError>> + Send;

    /// Resolve node names to ids, positionally; an unknown name yields
    /// `None` in its slot.
    fn ids_by_names(
        &self,
        names: &[&str],
    ) -> impl Future<Output = Result<Vec<Option<Uuid>>, StoreError>> + Send;
}

// ===== In-memory store =====

/// In-memory [`AuthStore`] used by tests and as the reference double.
#[derive(Debug, Default)]
pub struct MemStore {
    ids: HashMap<String, Uuid>,
    names: HashMap<Uuid, String>,
    edges: HashMap<Uuid, Vec<Uuid>>,
    grants: HashMap<String, Vec<Uuid>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node (role or permission) and return its id.
    pub fn node(&mut self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.ids.insert(name.to_owned(), id);
        self.names.insert(id, name.to_owned());
        id
    }

    /// Add a parent→child containment edge.
    pub fn edge(&mut self, parent: Uuid, child: Uuid) {
        self.edges.entry(parent).or_default().push(child);
    }

    /// Grant a node directly to a user.
    pub fn grant(&mut self, user: &str, node: Uuid) {
        self.grants.entry(user.to_owned()).or_default().push(node);
    }
}

impl AuthStore for MemStore {
    async fn assigned_names(&self, user: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .grants
            .get(user)
            .into_iter()
            .flatten()
            .filter_map(|id| self.names.get(id).cloned())
            .collect())
    }

    async fn assigned_ids(&self, user: &str) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.grants.get(user).cloned().unwrap_or_default())
    }

    async fn children_of(&self, parents: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        Ok(parents
            .iter()
            .filter_map(|id| self.edges.get(id))
            .flatten()
            .copied()
            .collect())
    }

    async fn ids_by_names(&self, names: &[&str]) -> Result<Vec<Option<Uuid>>, StoreError> {
        Ok(names.iter().map(|name| self.ids.get(*name).copied()).collect())
    }
}
