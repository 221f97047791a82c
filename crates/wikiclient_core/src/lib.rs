//! MediaWiki HTTP+JSON API client spanning two protocol generations.
//!
//! The 1.19-era and 1.31-era APIs are wire-incompatible (continuation
//! nesting, token acquisition, login handshake) but expose the same
//! capabilities; both live behind the [`api::WikiApi`] trait.

pub mod api;
pub mod config;
pub mod error;
pub mod legacy;
pub mod modern;
pub mod query;
pub mod session;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{
    Client, DeletedRevision, ImageRecord, NamespaceId, PageListOptions, ProtocolVersion,
    RedirectFilter, WikiApi,
};
pub use error::WikiError;
pub use legacy::LegacyClient;
pub use modern::ModernClient;
pub use query::Paged;
pub use session::{HttpOptions, HttpTransport, Transport, WireResponse};
