//! Authorization Server Core
//!
//! An HTTP/1.1 wire engine (incremental request parser, pattern router with
//! typed path captures, response writer with bounded chunked transfer) and
//! the role/permission authorization resolver the business handlers use.
#![warn(missing_debug_implementations)]

mod log;

pub mod method;
pub mod status;
pub mod headers;
pub mod uri;
pub mod parser;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod conn;
pub mod store;
pub mod authz;
pub mod routes;

pub use method::{Method, Methods};
pub use status::StatusCode;
pub use headers::HeaderMap;
pub use request::Request;
pub use response::{Body, Response};
pub use router::Router;
pub use server::{Server, ServerConfig};
