use serde::Deserialize;
use serde_json::Value;

use crate::api::{
    DeletedRevision, ImageRecord, NamespaceId, PageListOptions, ProtocolVersion, WikiApi,
};
use crate::error::{self, WikiError};
use crate::query::{self, Continuation, Paged, param};
use crate::session::{HttpOptions, HttpTransport, Session, Transport};
use crate::tokens::{SessionTokenCache, TokenKind};

/// Client for the 1.31-era API: unified `continue` paging, `meta=tokens`
/// acquisition, one session-global CSRF token for every mutation, and
/// token-first login.
pub struct ModernClient {
    session: Session,
    tokens: SessionTokenCache,
}

impl ModernClient {
    pub fn new(base_url: &str, options: &HttpOptions) -> Result<Self, WikiError> {
        let transport = HttpTransport::new(options)?;
        Ok(Self::with_transport(base_url, Box::new(transport)))
    }

    /// Build a client over a caller-supplied transport.
    pub fn with_transport(base_url: &str, transport: Box<dyn Transport>) -> Self {
        Self {
            session: Session::new(base_url, transport),
            tokens: SessionTokenCache::default(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.session.request_count()
    }

    /// One round of the unified token query.
    fn fetch_token(&mut self, kind: TokenKind) -> Result<String, WikiError> {
        let params = vec![
            param("action", "query"),
            param("meta", "tokens"),
            param("type", kind.as_str()),
        ];
        let payload = self.session.api_get(&params)?;
        error::reject_warnings(&payload)?;
        let token = payload
            .get("query")
            .and_then(|q| q.get("tokens"))
            .and_then(|tokens| tokens.get(kind.response_field()))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                WikiError::UnexpectedResponse(format!("no {kind} token in response"))
            })?;
        Ok(token.to_string())
    }

    /// CSRF token for mutations: fetched on the first edit or delete of the
    /// session, then reused until the session is dropped.
    fn ensure_csrf_token(&mut self) -> Result<String, WikiError> {
        if let Some(token) = self.tokens.csrf() {
            return Ok(token.to_string());
        }
        let token = self.fetch_token(TokenKind::Csrf)?;
        self.tokens.store_csrf(token.clone());
        Ok(token)
    }
}

impl WikiApi for ModernClient {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::Modern
    }

    fn namespace_list(&mut self) -> Result<Vec<NamespaceId>, WikiError> {
        query::namespace_list(&mut self.session)
    }

    fn image_list(&mut self, limit: u32) -> Paged<'_, ImageRecord> {
        Paged::new(
            &mut self.session,
            query::allimages_params(limit),
            "allimages",
            Continuation::Unified,
            query::expand_images,
        )
    }

    fn page_list(
        &mut self,
        namespace: NamespaceId,
        limit: u32,
        options: &PageListOptions,
    ) -> Paged<'_, String> {
        Paged::new(
            &mut self.session,
            query::allpages_params(namespace, limit, options),
            "allpages",
            Continuation::Unified,
            query::expand_titles,
        )
    }

    fn page_text(&mut self, title: &str) -> Result<String, WikiError> {
        let params = vec![param("action", "raw"), param("title", title)];
        self.session.index_get_raw(&params)
    }

    fn search_pages(
        &mut self,
        search: &str,
        namespace: NamespaceId,
        limit: u32,
    ) -> Result<Paged<'_, String>, WikiError> {
        Ok(Paged::new(
            &mut self.session,
            query::search_params(search, namespace, limit),
            "search",
            Continuation::Unified,
            query::expand_titles,
        ))
    }

    fn deleted_revisions(
        &mut self,
        namespace: NamespaceId,
        limit: u32,
    ) -> Paged<'_, DeletedRevision> {
        Paged::new(
            &mut self.session,
            query::deletedrevs_params(namespace, limit),
            "deletedrevs",
            Continuation::Unified,
            query::expand_deleted_revisions,
        )
    }

    fn delete_page(&mut self, title: &str, reason: Option<&str>) -> Result<(), WikiError> {
        let token = self.ensure_csrf_token()?;
        let mut params = vec![
            param("action", "delete"),
            param("title", title),
            param("token", token),
        ];
        if let Some(reason) = reason {
            params.push(param("reason", reason));
        }
        self.session.api_post(&params)?;
        Ok(())
    }

    fn edit_page(
        &mut self,
        title: &str,
        text: &str,
        summary: Option<&str>,
    ) -> Result<(), WikiError> {
        let token = self.ensure_csrf_token()?;
        let mut params = vec![
            param("action", "edit"),
            param("title", title),
            param("text", text),
            param("token", token),
        ];
        if let Some(summary) = summary {
            params.push(param("summary", summary));
        }
        self.session.api_post(&params)?;
        Ok(())
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), WikiError> {
        let token = self.fetch_token(TokenKind::Login)?;
        let params = vec![
            param("action", "login"),
            param("lgname", username),
            param("lgpassword", password),
            param("lgtoken", token),
        ];
        let payload = self.session.api_post(&params)?;
        error::reject_warnings(&payload)?;
        let parsed: LoginResponse = serde_json::from_value(payload)?;
        if parsed.login.result != "Success" {
            return Err(WikiError::Authentication {
                result: parsed.login.result,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    login: LoginPayload,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    result: String,
}
