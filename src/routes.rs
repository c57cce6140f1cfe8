//! Authorization endpoints.
//!
//! The handlers are gated on a shared integrity flag: while the flag is
//! down every endpoint answers `424 Failed Dependency` instead of touching
//! the store. The flag arrives over a [`watch`] channel so the component
//! observing integrity and the server never call into each other.
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;

use crate::authz::{AuthzError, AuthzResolver, Decision};
use crate::log::*;
use crate::method::Methods;
use crate::response::Response;
use crate::router::{ArgKind, Router, RouterError};
use crate::status::StatusCode;
use crate::store::AuthStore;

/// Create the integrity flag, initially up.
pub fn integrity_flag() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(true)
}

/// Register the authorization surface on `router`.
pub fn register<S>(
    router: &mut Router,
    resolver: Arc<AuthzResolver<S>>,
    integrity: watch::Receiver<bool>,
) -> Result<(), RouterError>
where
    S: AuthStore + 'static,
{
    let bag_resolver = Arc::clone(&resolver);
    let bag_gate = integrity.clone();
    router.register(
        "/api/v1/u-auth/authz",
        Methods::GET,
        vec![],
        move |_, request| {
            let resolver = Arc::clone(&bag_resolver);
            let gate = bag_gate.clone();
            async move {
                let up = *gate.borrow();
                if !up {
                    return Some(integrity_down());
                }
                Some(respond(resolver.check_query(&request.query_pairs()).await))
            }
        },
    )?;

    router.register(
        "/api/v1/u-auth/authz/<arg>/authorized-to/<arg>",
        Methods::GET,
        vec![ArgKind::Segment, ArgKind::Segment],
        move |captures, _| {
            let resolver = Arc::clone(&resolver);
            let gate = integrity.clone();
            async move {
                let up = *gate.borrow();
                if !up {
                    return Some(integrity_down());
                }
                let user = captures[0].as_str()?;
                let ident = captures[1].as_str()?;
                Some(respond(resolver.check(user, ident).await))
            }
        },
    )?;

    Ok(())
}

fn integrity_down() -> Response {
    Response::text(StatusCode::FAILED_DEPENDENCY, "system integrity is not assured")
}

fn respond(result: Result<Decision, AuthzError>) -> Response {
    match result {
        Ok(Decision::Authorized) => {
            Response::json(StatusCode::OK, &json!({ "authorized": true }))
        }
        Ok(Decision::Unauthorized) => {
            Response::json(StatusCode::UNAUTHORIZED, &json!({ "authorized": false }))
        }
        Err(err @ AuthzError::MissingParam(_)) => {
            Response::text(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(AuthzError::Store(err)) => {
            error!("authorization store failure: {err}");
            Response::new(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
