use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::WikiError;
use crate::legacy::LegacyClient;
use crate::modern::ModernClient;
use crate::query::Paged;
use crate::session::{HttpOptions, Transport};

/// Wiki namespace identifier. Listings only ever contain ids >= 0; negative
/// ids are virtual namespaces (Special, Media) and are filtered out.
pub type NamespaceId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedRevision {
    pub title: String,
    pub revision_id: i64,
    pub user: String,
    pub comment: String,
    pub content: String,
}

/// Which pages a listing includes with respect to redirects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RedirectFilter {
    #[default]
    All,
    Redirects,
    NonRedirects,
}

impl RedirectFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            RedirectFilter::All => "all",
            RedirectFilter::Redirects => "redirects",
            RedirectFilter::NonRedirects => "nonredirects",
        }
    }
}

impl FromStr for RedirectFilter {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "all" => Ok(RedirectFilter::All),
            "redirects" => Ok(RedirectFilter::Redirects),
            "nonredirects" => Ok(RedirectFilter::NonRedirects),
            other => Err(format!("unknown redirect filter: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageListOptions {
    /// Start listing from this title (inclusive).
    pub first_page: Option<String>,
    pub redirect_filter: RedirectFilter,
}

/// Supported MediaWiki API generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// 1.19 era: `query-continue` paging, per-page `intoken` tokens,
    /// challenge-response login.
    Legacy,
    /// 1.31 era: unified `continue` paging, `meta=tokens`, token-first login.
    Modern,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProtocolVersion::Legacy => "1.19",
            ProtocolVersion::Modern => "1.31",
        })
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "1.19" | "legacy" => Ok(ProtocolVersion::Legacy),
            "1.31" | "modern" => Ok(ProtocolVersion::Modern),
            other => Err(format!("unknown MediaWiki API version: {other}")),
        }
    }
}

/// The operations every protocol variant supports. Paged operations return
/// lazy iterators: no request is issued until the consumer pulls past the
/// buffered page, and dropping the iterator stops further requests.
pub trait WikiApi {
    fn version(&self) -> ProtocolVersion;

    /// All namespace ids in the wiki, ascending, virtual namespaces excluded.
    fn namespace_list(&mut self) -> Result<Vec<NamespaceId>, WikiError>;

    /// All images in the wiki, in server order, `limit` per request.
    fn image_list(&mut self, limit: u32) -> Paged<'_, ImageRecord>;

    /// All page titles in `namespace`, ascending lexical order.
    fn page_list(
        &mut self,
        namespace: NamespaceId,
        limit: u32,
        options: &PageListOptions,
    ) -> Paged<'_, String>;

    /// Raw text of the page `title`. Not available on every generation.
    fn page_text(&mut self, title: &str) -> Result<String, WikiError>;

    /// Titles of pages matching a full-text search in `namespace`.
    fn search_pages(
        &mut self,
        search: &str,
        namespace: NamespaceId,
        limit: u32,
    ) -> Result<Paged<'_, String>, WikiError>;

    /// Deleted revisions in `namespace`, ascending by deletion time.
    fn deleted_revisions(
        &mut self,
        namespace: NamespaceId,
        limit: u32,
    ) -> Paged<'_, DeletedRevision>;

    /// Delete a page outright.
    fn delete_page(&mut self, title: &str, reason: Option<&str>) -> Result<(), WikiError>;

    /// Replace the entire content of `title`, creating it if absent.
    fn edit_page(&mut self, title: &str, text: &str, summary: Option<&str>)
    -> Result<(), WikiError>;

    /// Establish an authenticated session for subsequent mutations.
    fn login(&mut self, username: &str, password: &str) -> Result<(), WikiError>;
}

/// A client for either protocol generation, selected at runtime.
pub enum Client {
    Legacy(LegacyClient),
    Modern(ModernClient),
}

impl Client {
    pub fn new(
        version: ProtocolVersion,
        base_url: &str,
        options: &HttpOptions,
    ) -> Result<Self, WikiError> {
        Ok(match version {
            ProtocolVersion::Legacy => Client::Legacy(LegacyClient::new(base_url, options)?),
            ProtocolVersion::Modern => Client::Modern(ModernClient::new(base_url, options)?),
        })
    }

    /// Build a client over a caller-supplied transport.
    pub fn with_transport(
        version: ProtocolVersion,
        base_url: &str,
        transport: Box<dyn Transport>,
    ) -> Self {
        match version {
            ProtocolVersion::Legacy => {
                Client::Legacy(LegacyClient::with_transport(base_url, transport))
            }
            ProtocolVersion::Modern => {
                Client::Modern(ModernClient::with_transport(base_url, transport))
            }
        }
    }

    pub fn request_count(&self) -> usize {
        match self {
            Client::Legacy(client) => client.request_count(),
            Client::Modern(client) => client.request_count(),
        }
    }
}

impl WikiApi for Client {
    fn version(&self) -> ProtocolVersion {
        match self {
            Client::Legacy(client) => client.version(),
            Client::Modern(client) => client.version(),
        }
    }

    fn namespace_list(&mut self) -> Result<Vec<NamespaceId>, WikiError> {
        match self {
            Client::Legacy(client) => client.namespace_list(),
            Client::Modern(client) => client.namespace_list(),
        }
    }

    fn image_list(&mut self, limit: u32) -> Paged<'_, ImageRecord> {
        match self {
            Client::Legacy(client) => client.image_list(limit),
            Client::Modern(client) => client.image_list(limit),
        }
    }

    fn page_list(
        &mut self,
        namespace: NamespaceId,
        limit: u32,
        options: &PageListOptions,
    ) -> Paged<'_, String> {
        match self {
            Client::Legacy(client) => client.page_list(namespace, limit, options),
            Client::Modern(client) => client.page_list(namespace, limit, options),
        }
    }

    fn page_text(&mut self, title: &str) -> Result<String, WikiError> {
        match self {
            Client::Legacy(client) => client.page_text(title),
            Client::Modern(client) => client.page_text(title),
        }
    }

    fn search_pages(
        &mut self,
        search: &str,
        namespace: NamespaceId,
        limit: u32,
    ) -> Result<Paged<'_, String>, WikiError> {
        match self {
            Client::Legacy(client) => client.search_pages(search, namespace, limit),
            Client::Modern(client) => client.search_pages(search, namespace, limit),
        }
    }

    fn deleted_revisions(
        &mut self,
        namespace: NamespaceId,
        limit: u32,
    ) -> Paged<'_, DeletedRevision> {
        match self {
            Client::Legacy(client) => client.deleted_revisions(namespace, limit),
            Client::Modern(client) => client.deleted_revisions(namespace, limit),
        }
    }

    fn delete_page(&mut self, title: &str, reason: Option<&str>) -> Result<(), WikiError> {
        match self {
            Client::Legacy(client) => client.delete_page(title, reason),
            Client::Modern(client) => client.delete_page(title, reason),
        }
    }

    fn edit_page(
        &mut self,
        title: &str,
        text: &str,
        summary: Option<&str>,
    ) -> Result<(), WikiError> {
        match self {
            Client::Legacy(client) => client.edit_page(title, text, summary),
            Client::Modern(client) => client.edit_page(title, text, summary),
        }
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), WikiError> {
        match self {
            Client::Legacy(client) => client.login(username, password),
            Client::Modern(client) => client.login(username, password),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Client, ProtocolVersion, RedirectFilter, WikiApi};
    use crate::testing::ScriptedTransport;

    #[test]
    fn protocol_version_parses_both_spellings() {
        assert_eq!("1.19".parse(), Ok(ProtocolVersion::Legacy));
        assert_eq!("legacy".parse(), Ok(ProtocolVersion::Legacy));
        assert_eq!("1.31".parse(), Ok(ProtocolVersion::Modern));
        assert_eq!("modern".parse(), Ok(ProtocolVersion::Modern));
        assert!("1.27".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn redirect_filter_round_trips_its_wire_names() {
        for filter in [
            RedirectFilter::All,
            RedirectFilter::Redirects,
            RedirectFilter::NonRedirects,
        ] {
            assert_eq!(filter.as_str().parse(), Ok(filter));
        }
        assert!("both".parse::<RedirectFilter>().is_err());
    }

    #[test]
    fn runtime_selected_client_dispatches_to_its_variant() {
        let mut transport = ScriptedTransport::new();
        transport.push_json(json!({
            "query": { "namespaces": { "-1": {}, "0": {}, "6": {} } }
        }));

        let mut client = Client::with_transport(
            ProtocolVersion::Legacy,
            "https://wiki.example.org",
            Box::new(transport),
        );

        assert_eq!(client.version(), ProtocolVersion::Legacy);
        assert_eq!(client.namespace_list().expect("namespaces"), vec![0, 6]);
        assert_eq!(client.request_count(), 1);
    }
}
