use serde::Deserialize;
use serde_json::Value;

use crate::api::{
    DeletedRevision, ImageRecord, NamespaceId, PageListOptions, ProtocolVersion, WikiApi,
};
use crate::error::{self, WikiError};
use crate::query::{self, Continuation, Paged, param};
use crate::session::{HttpOptions, HttpTransport, Session, Transport};
use crate::tokens::{PageTokenCache, TokenKind};

/// Client for the 1.19-era API: `query-continue` paging, page-scoped
/// `intoken` tokens, two-step challenge-response login. Page retrieval and
/// search do not exist on this generation.
pub struct LegacyClient {
    session: Session,
    tokens: PageTokenCache,
}

impl LegacyClient {
    pub fn new(base_url: &str, options: &HttpOptions) -> Result<Self, WikiError> {
        let transport = HttpTransport::new(options)?;
        Ok(Self::with_transport(base_url, Box::new(transport)))
    }

    /// Build a client over a caller-supplied transport.
    pub fn with_transport(base_url: &str, transport: Box<dyn Transport>) -> Self {
        Self {
            session: Session::new(base_url, transport),
            tokens: PageTokenCache::default(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.session.request_count()
    }

    /// Token authorizing a mutation of `title`. The first edit or delete of
    /// a title fetches and caches its token; later operations on the same
    /// title reuse it, a different title triggers its own fetch.
    fn page_token(&mut self, kind: TokenKind, title: &str) -> Result<String, WikiError> {
        if let Some(token) = self.tokens.get(kind, title) {
            return Ok(token.to_string());
        }

        let params = vec![
            param("action", "query"),
            param("prop", "info"),
            param("titles", title),
            param("intoken", kind.as_str()),
        ];
        let payload = self.session.api_post(&params)?;
        error::reject_warnings(&payload)?;

        let pages = payload
            .get("query")
            .and_then(|q| q.get("pages"))
            .and_then(Value::as_object)
            .ok_or_else(|| {
                WikiError::UnexpectedResponse("token response carries no pages".to_string())
            })?;
        for page in pages.values() {
            let (Some(page_title), Some(token)) = (
                page.get("title").and_then(Value::as_str),
                page.get(kind.response_field()).and_then(Value::as_str),
            ) else {
                continue;
            };
            self.tokens
                .insert(kind, page_title.to_string(), token.to_string());
        }

        self.tokens
            .get(kind, title)
            .map(str::to_string)
            .ok_or_else(|| {
                WikiError::UnexpectedResponse(format!("no {kind} token returned for {title}"))
            })
    }
}

impl WikiApi for LegacyClient {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::Legacy
    }

    fn namespace_list(&mut self) -> Result<Vec<NamespaceId>, WikiError> {
        query::namespace_list(&mut self.session)
    }

    fn image_list(&mut self, limit: u32) -> Paged<'_, ImageRecord> {
        Paged::new(
            &mut self.session,
            query::allimages_params(limit),
            "allimages",
            Continuation::PerList("allimages"),
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
            Continuation::PerList("allpages"),
            query::expand_titles,
        )
    }

    fn page_text(&mut self, _title: &str) -> Result<String, WikiError> {
        Err(WikiError::Unsupported {
            operation: "page_text",
            version: ProtocolVersion::Legacy,
        })
    }

    fn search_pages(
        &mut self,
        _search: &str,
        _namespace: NamespaceId,
        _limit: u32,
    ) -> Result<Paged<'_, String>, WikiError> {
        Err(WikiError::Unsupported {
            operation: "search_pages",
            version: ProtocolVersion::Legacy,
        })
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
            Continuation::PerList("deletedrevs"),
            query::expand_deleted_revisions,
        )
    }

    fn delete_page(&mut self, title: &str, reason: Option<&str>) -> Result<(), WikiError> {
        let token = self.page_token(TokenKind::Delete, title)?;
        let mut params = vec![param("action", "delete"), param("title", title)];
        if let Some(reason) = reason {
            params.push(param("reason", reason));
        }
        params.push(param("token", token));
        self.session.api_post(&params)?;
        Ok(())
    }

    fn edit_page(
        &mut self,
        title: &str,
        text: &str,
        summary: Option<&str>,
    ) -> Result<(), WikiError> {
        let token = self.page_token(TokenKind::Edit, title)?;
        let mut params = vec![
            param("action", "edit"),
            param("title", title),
            param("text", text),
        ];
        if let Some(summary) = summary {
            params.push(param("summary", summary));
        }
        params.push(param("token", token));
        self.session.api_post(&params)?;
        Ok(())
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), WikiError> {
        let params = vec![
            param("action", "login"),
            param("lgname", username),
            param("lgpassword", password),
        ];
        let payload = self.session.api_post(&params)?;
        error::reject_warnings(&payload)?;
        let first: LoginResponse = serde_json::from_value(payload)?;

        match first.login.result.as_str() {
            "Success" => return Ok(()),
            "NeedToken" => {}
            other => {
                return Err(WikiError::Authentication {
                    result: other.to_string(),
                });
            }
        }

        // Answer the challenge exactly once with the token we were handed.
        let token = first.login.token.ok_or_else(|| {
            WikiError::UnexpectedResponse("NeedToken response carries no token".to_string())
        })?;
        let params = vec![
            param("action", "login"),
            param("lgname", username),
            param("lgpassword", password),
            param("lgtoken", token),
        ];
        let payload = self.session.api_post(&params)?;
        error::reject_warnings(&payload)?;
        let second: LoginResponse = serde_json::from_value(payload)?;
        if second.login.result != "Success" {
            return Err(WikiError::Authentication {
                result: second.login.result,
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
    token: Option<String>,
}
