use std::collections::BTreeMap;
use std::fmt;

/// Token types the two protocol generations request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TokenKind {
    Edit,
    Delete,
    Csrf,
    Login,
}

impl TokenKind {
    /// Wire name used when requesting a token of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Edit => "edit",
            TokenKind::Delete => "delete",
            TokenKind::Csrf => "csrf",
            TokenKind::Login => "login",
        }
    }

    /// Field the token arrives under in a token response.
    pub fn response_field(self) -> &'static str {
        match self {
            TokenKind::Edit => "edittoken",
            TokenKind::Delete => "deletetoken",
            TokenKind::Csrf => "csrftoken",
            TokenKind::Login => "logintoken",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page-scoped token cache (1.19 dialect): one token per (kind, title),
/// fetched on first use and reused for the rest of the session. Tokens are
/// never proactively invalidated; a stale token surfaces as an ordinary API
/// error from the call that used it.
#[derive(Debug, Default)]
pub struct PageTokenCache {
    tokens: BTreeMap<(TokenKind, String), String>,
}

impl PageTokenCache {
    pub fn get(&self, kind: TokenKind, title: &str) -> Option<&str> {
        self.tokens
            .get(&(kind, title.to_string()))
            .map(String::as_str)
    }

    pub fn insert(&mut self, kind: TokenKind, title: String, token: String) {
        self.tokens.insert((kind, title), token);
    }
}

/// Session-global token cache (1.31 dialect): one CSRF token covers every
/// edit and delete for the lifetime of the session.
#[derive(Debug, Default)]
pub struct SessionTokenCache {
    csrf: Option<String>,
}

impl SessionTokenCache {
    pub fn csrf(&self) -> Option<&str> {
        self.csrf.as_deref()
    }

    pub fn store_csrf(&mut self, token: String) {
        self.csrf = Some(token);
    }
}
