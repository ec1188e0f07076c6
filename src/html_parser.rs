use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"var token = "(.*?)""#).expect("Failed to compile token regex")
});
static REDIRECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"window\.location\.href\s*=\s*'(.*?)';"#)
        .expect("Failed to compile redirect regex")
});
static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bid=([^&']*)").expect("Failed to compile id regex"));
static NUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bnum=([^&']*)").expect("Failed to compile num regex"));

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    TokenNotFound,
    RedirectNotFound,
    ParameterNotFound(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::TokenNotFound => write!(f, "SSO token not found in login response"),
            ParseError::RedirectNotFound => {
                write!(f, "client-side redirect not found in login response")
            }
            ParseError::ParameterNotFound(param) => {
                write!(f, "parameter '{}' not found", param)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Extracts the SSO token from the `var token = "..."` assignment the
/// login-check page embeds in an inline script.
///
/// An empty token is treated as not found: the portal emits the assignment
/// with an empty string on some rejection pages, and an empty token would
/// only fail later and less legibly at the SSO exchange.
pub fn extract_token(body: &str) -> Result<String, ParseError> {
    let token = TOKEN_RE
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(ParseError::TokenNotFound)?;
    if token.is_empty() {
        return Err(ParseError::TokenNotFound);
    }
    Ok(token)
}

/// Extracts the `window.location.href = '...';` target the login-check page
/// uses instead of an HTTP redirect.
pub fn extract_redirect_url(body: &str) -> Result<String, ParseError> {
    REDIRECT_RE
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(ParseError::RedirectNotFound)
}

/// Pulls the `id` and `num` query parameters out of the redirect URL.
pub fn extract_redirect_params(redirect_url: &str) -> Result<(String, String), ParseError> {
    let id = ID_RE
        .captures(redirect_url)
        .and_then(|captures| captures.get(1))
        .filter(|m| !m.as_str().is_empty())
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ParseError::ParameterNotFound("id".to_string()))?;
    let num = NUM_RE
        .captures(redirect_url)
        .and_then(|captures| captures.get(1))
        .filter(|m| !m.as_str().is_empty())
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ParseError::ParameterNotFound("num".to_string()))?;
    Ok((id, num))
}

/// Extracts the session user id (`id=...&`) from the session-check body.
pub fn extract_user_id(body: &str) -> Result<String, ParseError> {
    ID_RE
        .captures(body)
        .and_then(|captures| captures.get(1))
        .filter(|m| !m.as_str().is_empty())
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ParseError::ParameterNotFound("id".to_string()))
}
