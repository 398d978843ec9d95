//! CSRF token lookup in rendered console pages.
//!
//! The console renders the token as an attribute right after the field name,
//! e.g. `<input type="hidden" name="_csrf" value="..."/>` or
//! `<meta name="_csrf" content="..."/>`.
use regex::Regex;
use std::sync::LazyLock;

/// Whitespace-delimited token that precedes the CSRF value.
pub const CSRF_MARKER: &str = r#"name="_csrf""#;

/// Form field the token is submitted under.
pub const CSRF_FIELD: &str = "_csrf";

/// Header the token is submitted under for non-form posts.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

static QUOTED_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(.*?)""#).expect("regex for quoted CSRF value"));

/// Return the quoted value in the token that follows [`CSRF_MARKER`].
pub fn extract_csrf(body: &str) -> Option<String> {
    let mut tokens = body.split_whitespace();
    tokens.find(|token| *token == CSRF_MARKER)?;
    let value_token = tokens.next()?;
    QUOTED_VALUE_RE
        .captures(value_token)
        .and_then(|cap| cap.get(1))
        .map(|value| value.as_str().to_string())
}
