//! HTTP side of the dashboard: endpoints, the transport seam, and the auth header supplier.

mod auth;
mod endpoint;
mod error;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthHeaders, BearerToken};
pub use endpoint::{DataKind, Endpoint, UnknownKind};
pub use error::FetchError;
pub use transport::{HttpResponse, ReqwestTransport, Transport};
