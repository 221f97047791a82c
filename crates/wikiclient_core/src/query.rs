use std::collections::VecDeque;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::api::{DeletedRevision, ImageRecord, NamespaceId, PageListOptions};
use crate::error::WikiError;
use crate::session::Session;

/// Where a response carries its continuation cursor. This is the whole of
/// the paging drift between the two protocol generations.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Continuation {
    /// 1.19 dialect: nested under `query-continue`, one object per list name.
    PerList(&'static str),
    /// 1.31 dialect: a single top-level `continue` object.
    Unified,
}

pub(crate) fn param(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

/// Lazy paged query over api.php. No request is issued until the consumer
/// pulls past the buffered page; the cursor returned by each response is
/// echoed verbatim into the next request until the server omits it.
///
/// A failure ends the sequence; items already yielded stay delivered.
pub struct Paged<'a, T> {
    session: &'a mut Session,
    base_params: Vec<(String, String)>,
    list_key: &'static str,
    continuation: Continuation,
    expand: fn(&Value) -> Result<Vec<T>, WikiError>,
    cursor: Map<String, Value>,
    buffer: VecDeque<T>,
    finished: bool,
}

impl<'a, T> Paged<'a, T> {
    pub(crate) fn new(
        session: &'a mut Session,
        base_params: Vec<(String, String)>,
        list_key: &'static str,
        continuation: Continuation,
        expand: fn(&Value) -> Result<Vec<T>, WikiError>,
    ) -> Self {
        Self {
            session,
            base_params,
            list_key,
            continuation,
            expand,
            cursor: Map::new(),
            buffer: VecDeque::new(),
            finished: false,
        }
    }

    fn fetch_next_page(&mut self) -> Result<(), WikiError> {
        let mut params = self.base_params.clone();
        for (key, value) in &self.cursor {
            params.push((key.clone(), cursor_value(value)));
        }

        let payload = self.session.api_get(&params)?;
        if let Some(list) = payload
            .get("query")
            .and_then(|query| query.get(self.list_key))
        {
            self.buffer.extend((self.expand)(list)?);
        }

        let next = match self.continuation {
            Continuation::PerList(list) => payload
                .get("query-continue")
                .and_then(|cont| cont.get(list)),
            Continuation::Unified => payload.get("continue"),
        };
        match next {
            Some(Value::Object(map)) => self.cursor = map.clone(),
            _ => self.finished = true,
        }
        Ok(())
    }
}

impl<T> Iterator for Paged<'_, T> {
    type Item = Result<T, WikiError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.finished {
                return None;
            }
            if let Err(error) = self.fetch_next_page() {
                self.finished = true;
                return Some(Err(error));
            }
        }
    }
}

/// Render a cursor value back into a request parameter unmodified.
fn cursor_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Namespaces, shared by both dialects. Virtual namespaces (id < 0, such as
/// Special and Media) are always filtered out.
pub(crate) fn namespace_list(session: &mut Session) -> Result<Vec<NamespaceId>, WikiError> {
    let params = vec![
        param("action", "query"),
        param("meta", "siteinfo"),
        param("siprop", "namespaces"),
    ];
    let payload = session.api_get(&params)?;
    let parsed: SiteInfoResponse = serde_json::from_value(payload)?;

    let mut ids = Vec::new();
    for key in parsed.query.namespaces.keys() {
        let id: NamespaceId = key.parse().map_err(|_| {
            WikiError::UnexpectedResponse(format!("non-numeric namespace id {key:?}"))
        })?;
        if id >= 0 {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

pub(crate) fn allimages_params(limit: u32) -> Vec<(String, String)> {
    vec![
        param("action", "query"),
        param("list", "allimages"),
        param("aidir", "ascending"),
        param("ailimit", limit.to_string()),
    ]
}

pub(crate) fn allpages_params(
    namespace: NamespaceId,
    limit: u32,
    options: &PageListOptions,
) -> Vec<(String, String)> {
    let mut params = vec![
        param("action", "query"),
        param("list", "allpages"),
        param("apnamespace", namespace.to_string()),
        param("apdir", "ascending"),
        param("apfilterredir", options.redirect_filter.as_str()),
        param("aplimit", limit.to_string()),
    ];
    if let Some(first_page) = &options.first_page {
        params.push(param("apfrom", first_page.clone()));
    }
    params
}

pub(crate) fn search_params(
    search: &str,
    namespace: NamespaceId,
    limit: u32,
) -> Vec<(String, String)> {
    vec![
        param("action", "query"),
        param("list", "search"),
        param("srsearch", search),
        param("srnamespace", namespace.to_string()),
        param("srlimit", limit.to_string()),
        param("srwhat", "text"),
    ]
}

pub(crate) fn deletedrevs_params(namespace: NamespaceId, limit: u32) -> Vec<(String, String)> {
    vec![
        param("action", "query"),
        param("list", "deletedrevs"),
        param("drnamespace", namespace.to_string()),
        param("drdir", "newer"),
        param("drlimit", limit.to_string()),
        param("drprop", "revid|user|comment|content"),
    ]
}

pub(crate) fn expand_titles(list: &Value) -> Result<Vec<String>, WikiError> {
    let items: Vec<TitleItem> = serde_json::from_value(list.clone())?;
    Ok(items.into_iter().map(|item| item.title).collect())
}

pub(crate) fn expand_images(list: &Value) -> Result<Vec<ImageRecord>, WikiError> {
    let items: Vec<ImageItem> = serde_json::from_value(list.clone())?;
    Ok(items
        .into_iter()
        .map(|item| ImageRecord {
            title: item.title,
            url: item.url,
        })
        .collect())
}

/// Deleted revisions arrive grouped by page; the page title is copied onto
/// every revision belonging to it.
pub(crate) fn expand_deleted_revisions(list: &Value) -> Result<Vec<DeletedRevision>, WikiError> {
    let pages: Vec<DeletedPageItem> = serde_json::from_value(list.clone())?;
    let mut revisions = Vec::new();
    for page in pages {
        for revision in page.revisions {
            revisions.push(DeletedRevision {
                title: page.title.clone(),
                revision_id: revision.revid,
                user: revision.user,
                comment: revision.comment,
                content: revision.content,
            });
        }
    }
    Ok(revisions)
}

#[derive(Debug, Deserialize)]
struct SiteInfoResponse {
    query: SiteInfoQuery,
}

#[derive(Debug, Deserialize)]
struct SiteInfoQuery {
    namespaces: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TitleItem {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ImageItem {
    title: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct DeletedPageItem {
    title: String,
    #[serde(default)]
    revisions: Vec<DeletedRevisionItem>,
}

#[derive(Debug, Deserialize)]
struct DeletedRevisionItem {
    revid: i64,
    #[serde(default)]
    user: String,
    #[serde(default)]
    comment: String,
    // Format-version-1 bodies carry revision text under "*".
    #[serde(default, rename = "*")]
    content: String,
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{
        Continuation, Paged, expand_deleted_revisions, expand_titles, namespace_list, param,
    };
    use crate::error::WikiError;
    use crate::session::Session;
    use crate::testing::ScriptedTransport;

    fn session_with(transport: ScriptedTransport) -> Session {
        Session::new("https://wiki.example.org", Box::new(transport))
    }

    fn allpages_page(titles: &[&str]) -> Value {
        let items: Vec<Value> = titles.iter().map(|title| json!({ "title": title })).collect();
        json!({ "query": { "allpages": items } })
    }

    fn base_params() -> Vec<(String, String)> {
        vec![param("action", "query"), param("list", "allpages")]
    }

    #[test]
    fn per_list_dialect_pages_to_completion_in_order() {
        let mut transport = ScriptedTransport::new();
        let mut first = allpages_page(&["A", "B"]);
        first["query-continue"] = json!({ "allpages": { "apcontinue": "C" } });
        transport.push_json(first);
        let mut second = allpages_page(&["C", "D"]);
        second["query-continue"] = json!({ "allpages": { "apcontinue": "E" } });
        transport.push_json(second);
        transport.push_json(allpages_page(&["E"]));
        let log = transport.log();

        let mut session = session_with(transport);
        let paged = Paged::new(
            &mut session,
            base_params(),
            "allpages",
            Continuation::PerList("allpages"),
            expand_titles,
        );
        let titles = paged.collect::<Result<Vec<_>, _>>().expect("collect pages");

        assert_eq!(titles, vec!["A", "B", "C", "D", "E"]);
        let log = log.borrow();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].param("apcontinue"), None);
        assert_eq!(log[1].param("apcontinue"), Some("C"));
        assert_eq!(log[2].param("apcontinue"), Some("E"));
    }

    #[test]
    fn unified_dialect_echoes_every_cursor_field() {
        let mut transport = ScriptedTransport::new();
        let mut first = allpages_page(&["A"]);
        first["continue"] = json!({ "apcontinue": "B", "continue": "-||" });
        transport.push_json(first);
        transport.push_json(allpages_page(&["B"]));
        let log = transport.log();

        let mut session = session_with(transport);
        let paged = Paged::new(
            &mut session,
            base_params(),
            "allpages",
            Continuation::Unified,
            expand_titles,
        );
        let titles = paged.collect::<Result<Vec<_>, _>>().expect("collect pages");

        assert_eq!(titles, vec!["A", "B"]);
        let log = log.borrow();
        assert_eq!(log[1].param("apcontinue"), Some("B"));
        assert_eq!(log[1].param("continue"), Some("-||"));
    }

    #[test]
    fn numeric_cursor_values_round_trip_as_parameters() {
        let mut transport = ScriptedTransport::new();
        let mut first = json!({ "query": { "search": [{ "title": "Alpha" }] } });
        first["continue"] = json!({ "sroffset": 1, "continue": "-||" });
        transport.push_json(first);
        transport.push_json(json!({ "query": { "search": [{ "title": "Beta" }] } }));
        let log = transport.log();

        let mut session = session_with(transport);
        let paged = Paged::new(
            &mut session,
            vec![param("action", "query"), param("list", "search")],
            "search",
            Continuation::Unified,
            expand_titles,
        );
        let titles = paged.collect::<Result<Vec<_>, _>>().expect("collect hits");

        assert_eq!(titles, vec!["Alpha", "Beta"]);
        assert_eq!(log.borrow()[1].param("sroffset"), Some("1"));
    }

    #[test]
    fn mismatched_dialect_cursor_is_ignored_and_ends_the_sequence() {
        // A unified reader never follows a query-continue field.
        let mut transport = ScriptedTransport::new();
        let mut first = allpages_page(&["A"]);
        first["query-continue"] = json!({ "allpages": { "apcontinue": "B" } });
        transport.push_json(first);
        let log = transport.log();

        let mut session = session_with(transport);
        let paged = Paged::new(
            &mut session,
            base_params(),
            "allpages",
            Continuation::Unified,
            expand_titles,
        );
        let titles = paged.collect::<Result<Vec<_>, _>>().expect("collect pages");

        assert_eq!(titles, vec!["A"]);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn empty_page_with_a_cursor_keeps_paging() {
        let mut transport = ScriptedTransport::new();
        let mut first = allpages_page(&[]);
        first["query-continue"] = json!({ "allpages": { "apcontinue": "X" } });
        transport.push_json(first);
        transport.push_json(allpages_page(&["X"]));
        let log = transport.log();

        let mut session = session_with(transport);
        let paged = Paged::new(
            &mut session,
            base_params(),
            "allpages",
            Continuation::PerList("allpages"),
            expand_titles,
        );
        let titles = paged.collect::<Result<Vec<_>, _>>().expect("collect pages");

        assert_eq!(titles, vec!["X"]);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn failure_mid_stream_delivers_earlier_items_first() {
        let mut transport = ScriptedTransport::new();
        let mut first = allpages_page(&["A", "B"]);
        first["query-continue"] = json!({ "allpages": { "apcontinue": "C" } });
        transport.push_json(first);
        transport.push_json(json!({
            "error": { "code": "internal_api_error", "info": "boom" }
        }));

        let mut session = session_with(transport);
        let mut paged = Paged::new(
            &mut session,
            base_params(),
            "allpages",
            Continuation::PerList("allpages"),
            expand_titles,
        );

        assert_eq!(paged.next().unwrap().unwrap(), "A");
        assert_eq!(paged.next().unwrap().unwrap(), "B");
        let error = paged.next().unwrap().expect_err("page fetch must fail");
        assert!(matches!(error, WikiError::Api { code, .. } if code == "internal_api_error"));
        assert!(paged.next().is_none());
    }

    #[test]
    fn transport_failure_mid_stream_is_terminal() {
        let mut transport = ScriptedTransport::new();
        let mut first = allpages_page(&["A"]);
        first["query-continue"] = json!({ "allpages": { "apcontinue": "B" } });
        transport.push_json(first);
        transport.push_response(502, "bad gateway");

        let mut session = session_with(transport);
        let mut paged = Paged::new(
            &mut session,
            base_params(),
            "allpages",
            Continuation::PerList("allpages"),
            expand_titles,
        );

        assert_eq!(paged.next().unwrap().unwrap(), "A");
        let error = paged.next().unwrap().expect_err("page fetch must fail");
        assert!(matches!(error, WikiError::Transport { status: 502 }));
        assert!(paged.next().is_none());
    }

    #[test]
    fn namespace_list_filters_virtual_namespaces() {
        let mut transport = ScriptedTransport::new();
        transport.push_json(json!({
            "query": {
                "namespaces": {
                    "-2": { "id": -2, "*": "Media" },
                    "-1": { "id": -1, "*": "Special" },
                    "0": { "id": 0, "*": "" },
                    "14": { "id": 14, "*": "Category" },
                    "2": { "id": 2, "*": "User" }
                }
            }
        }));
        let log = transport.log();

        let mut session = session_with(transport);
        let ids = namespace_list(&mut session).expect("namespace list");

        assert_eq!(ids, vec![0, 2, 14]);
        let log = log.borrow();
        assert_eq!(log[0].param("meta"), Some("siteinfo"));
        assert_eq!(log[0].param("siprop"), Some("namespaces"));
    }

    #[test]
    fn deleted_revision_expansion_copies_the_page_title() {
        let list = json!([
            {
                "title": "Old page",
                "revisions": [
                    { "revid": 11, "user": "alice", "comment": "created", "*": "body one" },
                    { "revid": 12 }
                ]
            },
            { "title": "Other", "revisions": [{ "revid": 20, "user": "bob", "*": "x" }] }
        ]);

        let revisions = expand_deleted_revisions(&list).expect("expand");

        assert_eq!(revisions.len(), 3);
        assert_eq!(revisions[0].title, "Old page");
        assert_eq!(revisions[0].revision_id, 11);
        assert_eq!(revisions[0].content, "body one");
        assert_eq!(revisions[1].title, "Old page");
        assert_eq!(revisions[1].user, "");
        assert_eq!(revisions[2].title, "Other");
    }
}
