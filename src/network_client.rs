use reqwest::header::{HeaderName, HeaderValue, COOKIE, ORIGIN, REFERER};
use reqwest::{Client, Error as ReqwestError, StatusCode};
use std::time::Instant;
use serde::Deserialize;
use log::{debug, info};
use serde_json;

use crate::captcha::CaptchaSolver;
use crate::cookie_jar::CookieJar;
use crate::endpoints::Endpoints;
use crate::html_parser::{self, ParseError};

#[derive(Debug, Deserialize)]
struct SsoLoginResponse {
    code: i32,
    #[serde(default)]
    info: String,
}

/// Product of a completed login: the accumulated cookies plus the user id
/// every authenticated request must carry.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub cookies: CookieJar,
}

#[derive(Debug)]
pub enum NetworkError {
    Reqwest(ReqwestError),
    ApiError { status: StatusCode, message: String },
    /// The login-check response did not contain the token/redirect markup.
    /// Wrong password and expired CAPTCHA are indistinguishable here, so no
    /// finer diagnosis is attempted.
    AuthFlowIncomplete(ParseError),
    SsoRejected { code: i32, info: String },
    SessionExpired,
    Captcha(std::io::Error),
    SerdeJsonError(serde_json::Error),
}

impl From<ReqwestError> for NetworkError {
    fn from(err: ReqwestError) -> NetworkError {
        NetworkError::Reqwest(err)
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> NetworkError {
        NetworkError::SerdeJsonError(err)
    }
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::Reqwest(e) => write!(f, "HTTP request error: {}", e),
            NetworkError::ApiError { status, message } => {
                write!(f, "API error ({}): {}", status, message)
            }
            NetworkError::AuthFlowIncomplete(e) => {
                write!(f, "authentication flow did not complete: {}", e)
            }
            NetworkError::SsoRejected { code, info } => {
                write!(f, "SSO login rejected (code {}): {}", code, info)
            }
            NetworkError::SessionExpired => write!(f, "portal session expired"),
            NetworkError::Captcha(e) => write!(f, "CAPTCHA solving failed: {}", e),
            NetworkError::SerdeJsonError(e) => write!(f, "JSON deserialization error: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetworkError::Reqwest(e) => Some(e),
            NetworkError::AuthFlowIncomplete(e) => Some(e),
            NetworkError::Captcha(e) => Some(e),
            NetworkError::SerdeJsonError(e) => Some(e),
            _ => None,
        }
    }
}

/// Builds the one client the whole flow shares.
///
/// The portal's certificate chain does not validate and its IIS frontends
/// misbehave over HTTP/2, so both are turned off. Redirects must never be
/// followed: the session-check step encodes its result in a response that
/// has to be read as-is.
pub fn build_client() -> Result<Client, ReqwestError> {
    Client::builder()
        .danger_accept_invalid_certs(true)
        .http1_only()
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

fn attach_cookies(request: reqwest::RequestBuilder, jar: &CookieJar) -> reqwest::RequestBuilder {
    match jar.header_value() {
        Some(value) => request.header(COOKIE, value),
        None => request,
    }
}

/// Step 1: fetch the CAPTCHA image, capturing the first session cookies.
pub async fn fetch_captcha(
    client: &Client,
    endpoints: &Endpoints,
    jar: &mut CookieJar,
) -> Result<Vec<u8>, NetworkError> {
    let start_time = Instant::now();
    let response = client.get(endpoints.verify_code.clone()).send().await?;
    info!(
        "[TIMING] fetch_captcha from {} took {:.2?}",
        endpoints.verify_code,
        start_time.elapsed()
    );

    if !response.status().is_success() {
        return Err(NetworkError::ApiError {
            status: response.status(),
            message: format!("Failed to fetch CAPTCHA from {}", endpoints.verify_code),
        });
    }
    jar.merge_response(&response);
    Ok(response.bytes().await?.to_vec())
}

/// Step 2+3: POST the credentials and CAPTCHA answer, then scrape the SSO
/// token and the `id`/`num` redirect parameters out of the response markup.
pub async fn submit_credentials(
    client: &Client,
    endpoints: &Endpoints,
    jar: &mut CookieJar,
    captcha_code: &str,
    student_id: &str,
    password: &str,
) -> Result<(String, String, String), NetworkError> {
    let params = [
        ("Verifycode", captcha_code),
        ("muser", student_id),
        ("passwd", password),
    ];
    debug!("[API] Sending POST to {}", endpoints.login_check);

    let start_time = Instant::now();
    let request = client
        .post(endpoints.login_check.clone())
        .header(REFERER, &endpoints.login_referer)
        .header(ORIGIN, &endpoints.login_referer)
        .form(&params);
    let response = attach_cookies(request, jar).send().await?;
    info!(
        "[TIMING] submit_credentials to {} took {:.2?}",
        endpoints.login_check,
        start_time.elapsed()
    );

    if !response.status().is_success() {
        return Err(NetworkError::ApiError {
            status: response.status(),
            message: format!("Login check failed at {}", endpoints.login_check),
        });
    }
    jar.merge_response(&response);

    let body = response.text().await?;
    debug!("[API] login check response body: {}", body);

    let token = html_parser::extract_token(&body).map_err(NetworkError::AuthFlowIncomplete)?;
    let redirect_url =
        html_parser::extract_redirect_url(&body).map_err(NetworkError::AuthFlowIncomplete)?;
    let (id, num) = html_parser::extract_redirect_params(&redirect_url)
        .map_err(NetworkError::AuthFlowIncomplete)?;
    info!("Login accepted, redirect id={} num={}", id, num);
    Ok((token, id, num))
}

/// Step 4: trade the token for a cross-domain SSO cookie.
pub async fn sso_exchange(
    client: &Client,
    endpoints: &Endpoints,
    jar: &mut CookieJar,
    token: &str,
) -> Result<(), NetworkError> {
    let start_time = Instant::now();
    let request = client
        .post(endpoints.sso_login.clone())
        .header(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        )
        .form(&[("token", token)]);
    let response = attach_cookies(request, jar).send().await?;
    info!(
        "[TIMING] sso_exchange to {} took {:.2?}",
        endpoints.sso_login,
        start_time.elapsed()
    );

    if !response.status().is_success() {
        return Err(NetworkError::ApiError {
            status: response.status(),
            message: format!("SSO exchange failed at {}", endpoints.sso_login),
        });
    }
    jar.merge_response(&response);

    let body = response.text().await?;
    debug!("[API] SSO response body: {}", body);
    let sso: SsoLoginResponse = serde_json::from_str(&body).map_err(NetworkError::from)?;
    // A missing account answers 400 in the body, success answers 200.
    if sso.code != 200 {
        return Err(NetworkError::SsoRejected {
            code: sso.code,
            info: sso.info,
        });
    }
    Ok(())
}

/// Step 5: exchange `id`/`num` for the session user id. Redirects stay
/// disabled; the id is scraped out of the un-chased response body.
pub async fn establish_session(
    client: &Client,
    endpoints: &Endpoints,
    jar: &mut CookieJar,
    id: &str,
    num: &str,
) -> Result<String, NetworkError> {
    let query = [
        ("id", id),
        ("num", num),
        ("ssourl", endpoints.sso_url.as_str()),
        ("hosturl", endpoints.host_url.as_str()),
        ("ssologin", ""),
    ];
    debug!("[API] Sending GET to {} with id={} num={}", endpoints.session_check, id, num);

    let start_time = Instant::now();
    let request = client
        .get(endpoints.session_check.clone())
        .header(REFERER, &endpoints.session_referer)
        .query(&query);
    let response = attach_cookies(request, jar).send().await?;
    info!(
        "[TIMING] establish_session at {} took {:.2?}",
        endpoints.session_check,
        start_time.elapsed()
    );

    // The step answers with a redirect it expects a browser to follow; any
    // status is acceptable as long as the body carries the user id.
    jar.merge_response(&response);
    let body = response.text().await?;
    html_parser::extract_user_id(&body).map_err(NetworkError::AuthFlowIncomplete)
}

/// Authenticated GET against the session host. Surfaces the portal's
/// "log in again" page as a typed expiry instead of mystery HTML.
pub async fn fetch_with_session(
    client: &Client,
    endpoints: &Endpoints,
    jar: &mut CookieJar,
    url: &url::Url,
    user_id: &str,
) -> Result<String, NetworkError> {
    let start_time = Instant::now();
    let request = client
        .get(url.clone())
        .header(REFERER, &endpoints.session_referer)
        .query(&[("id", user_id)]);
    let response = attach_cookies(request, jar).send().await?;
    info!(
        "[TIMING] fetch_with_session for {} took {:.2?}",
        url,
        start_time.elapsed()
    );

    if !response.status().is_success() {
        return Err(NetworkError::ApiError {
            status: response.status(),
            message: format!("Failed to fetch {}", url),
        });
    }
    jar.merge_response(&response);

    let body = response.text().await?;
    if body.contains("重新登录") {
        return Err(NetworkError::SessionExpired);
    }
    Ok(body)
}

/// Step 6: fetch the protected student information page.
pub async fn fetch_student_info(
    client: &Client,
    endpoints: &Endpoints,
    session: &mut Session,
) -> Result<String, NetworkError> {
    let url = endpoints.student_info.clone();
    fetch_with_session(client, endpoints, &mut session.cookies, &url, &session.user_id).await
}

/// Probes whether an established session is still live.
pub async fn check_session(
    client: &Client,
    endpoints: &Endpoints,
    session: &mut Session,
) -> Result<(), NetworkError> {
    let url = endpoints.keepalive.clone();
    let body =
        fetch_with_session(client, endpoints, &mut session.cookies, &url, &session.user_id).await?;
    if !body.contains("当前用户") {
        return Err(NetworkError::SessionExpired);
    }
    Ok(())
}

/// Runs the whole bootstrap: CAPTCHA, credentials, SSO exchange, session
/// establishment. Every step feeds the next through the same jar.
pub async fn login(
    client: &Client,
    endpoints: &Endpoints,
    solver: &dyn CaptchaSolver,
    student_id: &str,
    password: &str,
) -> Result<Session, NetworkError> {
    let mut jar = CookieJar::new();

    let image = fetch_captcha(client, endpoints, &mut jar).await?;
    let captcha_code = solver.solve(&image).map_err(NetworkError::Captcha)?;
    debug!("CAPTCHA answer: {}", captcha_code);

    let (token, id, num) = submit_credentials(
        client,
        endpoints,
        &mut jar,
        &captcha_code,
        student_id,
        password,
    )
    .await?;
    debug!("SSO token: {}", token);

    sso_exchange(client, endpoints, &mut jar, &token).await?;
    let user_id = establish_session(client, endpoints, &mut jar, &id, &num).await?;
    info!("Session established, user id: {}", user_id);

    Ok(Session {
        user_id,
        cookies: jar,
    })
}
