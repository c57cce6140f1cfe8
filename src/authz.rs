//! Role/permission authorization resolver.
//!
//! Authorization asks whether a permission is reachable from a user's
//! directly granted nodes through the parent→child containment graph. The
//! reachable set is computed iteratively to a fixed point, so cycles and
//! diamonds in the graph terminate and count once.
use std::collections::HashSet;
use uuid::Uuid;

use crate::log::*;
use crate::store::{AuthStore, StoreError};

/// Role name whose holders bypass every check.
pub const ADMIN_NAME: &str = "UAuthAdmin";

/// Outcome of an authorization check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Authorized,
    Unauthorized,
}

/// Resolver failure, distinct from a negative [`Decision`].
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The caller omitted a required parameter. Maps to 400.
    #[error("missing request parameter: {0}")]
    MissingParam(&'static str),
    /// The store failed. Maps to 500.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Authorization resolver over an [`AuthStore`].
#[derive(Debug)]
pub struct AuthzResolver<S> {
    store: S,
}

impl<S: AuthStore> AuthzResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Check whether `user_id` holds the permission(s) named by `ident`.
    ///
    /// `ident` is either a single node id in UUID form, or one or more
    /// space-separated node names, all of which must be reachable. Holders
    /// of [`ADMIN_NAME`] are authorized unconditionally, even for idents
    /// naming nothing that exists.
    pub async fn check(&self, user_id: &str, ident: &str) -> Result<Decision, AuthzError> {
        let assigned = self.store.assigned_names(user_id).await?;
        if assigned.iter().any(|name| name == ADMIN_NAME) {
            debug!("user {user_id} authorized as {ADMIN_NAME}");
            return Ok(Decision::Authorized);
        }

        let frontier = self.store.assigned_ids(user_id).await?;
        if frontier.is_empty() {
            return Ok(Decision::Unauthorized);
        }
        let closure = self.closure(frontier).await?;

        if let Ok(id) = Uuid::parse_str(ident) {
            return Ok(decide(closure.contains(&id)));
        }

        let names: Vec<&str> = ident.split(' ').filter(|name| !name.is_empty()).collect();
        if names.is_empty() {
            return Ok(Decision::Unauthorized);
        }
        let ids = self.store.ids_by_names(&names).await?;
        let all_reachable = ids
            .iter()
            .all(|id| matches!(id, Some(id) if closure.contains(id)));
        Ok(decide(all_reachable))
    }

    /// Request-scoped check over decoded query pairs.
    ///
    /// Requires `user_id` and at least one `rp_id` or `rp_name`; every
    /// requested ident must individually authorize.
    pub async fn check_query(
        &self,
        pairs: &[(String, String)],
    ) -> Result<Decision, AuthzError> {
        let user_id = pairs
            .iter()
            .find(|(key, _)| key == "user_id")
            .map(|(_, value)| value.as_str())
            .ok_or(AuthzError::MissingParam("user_id"))?;

        let idents: Vec<&str> = pairs
            .iter()
            .filter(|(key, _)| key == "rp_id" || key == "rp_name")
            .map(|(_, value)| value.as_str())
            .collect();
        if idents.is_empty() {
            return Err(AuthzError::MissingParam("rp_id or rp_name"));
        }

        for ident in idents {
            if self.check(user_id, ident).await? == Decision::Unauthorized {
                return Ok(Decision::Unauthorized);
            }
        }
        Ok(Decision::Authorized)
    }

    /// Reachable set from `frontier`, grown one expansion round at a time
    /// until no round adds a node.
    async fn closure(&self, frontier: Vec<Uuid>) -> Result<HashSet<Uuid>, AuthzError> {
        let mut seen: HashSet<Uuid> = frontier.iter().copied().collect();
        let mut frontier = frontier;
        while !frontier.is_empty() {
            let children = self.store.children_of(&frontier).await?;
            frontier = children.into_iter().filter(|id| seen.insert(*id)).collect();
        }
        Ok(seen)
    }
}

fn decide(authorized: bool) -> Decision {
    if authorized { Decision::Authorized } else { Decision::Unauthorized }
}
