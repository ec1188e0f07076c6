use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jwch_login::captcha::CaptchaSolver;
use jwch_login::endpoints::Endpoints;
use jwch_login::network_client::{self, NetworkError};

const CAPTCHA_BYTES: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

struct FixedSolver(&'static str);

impl CaptchaSolver for FixedSolver {
    fn solve(&self, image: &[u8]) -> std::io::Result<String> {
        assert_eq!(image, CAPTCHA_BYTES);
        Ok(self.0.to_string())
    }
}

fn endpoints_for(server: &MockServer) -> Endpoints {
    let base = Url::parse(&server.uri()).unwrap();
    Endpoints::rooted_at(&base).unwrap()
}

async fn mount_happy_path(server: &MockServer, endpoints: &Endpoints) {
    Mock::given(method("GET"))
        .and(path("/plus/verifycode.asp"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "A=1")
                .set_body_bytes(CAPTCHA_BYTES),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/logincheck.asp"))
        .and(header("cookie", "A=1"))
        .and(header("referer", endpoints.login_referer.as_str()))
        .and(header("origin", endpoints.login_referer.as_str()))
        .and(body_string_contains("Verifycode=abcd"))
        .and(body_string_contains("muser=102300001"))
        .and(body_string_contains("passwd=hunter2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "B=2")
                .set_body_string(concat!(
                    r#"<script>var token = "T1";"#,
                    "window.location.href =  'loginchk_xs.aspx?id=5&num=9&ssourl=x';",
                    "</script>",
                )),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/Sfrz/SSOLogin"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(body_string_contains("token=T1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "C=3")
                .set_body_string(r#"{"code":200,"info":"success"}"#),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/loginchk_xs.aspx"))
        .and(query_param("id", "5"))
        .and(query_param("num", "9"))
        .and(query_param("ssourl", endpoints.sso_url.as_str()))
        .and(query_param("hosturl", endpoints.host_url.as_str()))
        .and(query_param("ssologin", ""))
        .and(header("referer", endpoints.session_referer.as_str()))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("set-cookie", "D=4")
                .set_body_string("id=77&"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_flow_accumulates_cookies_and_fetches_protected_page() {
    let server = MockServer::start().await;
    let endpoints = endpoints_for(&server);
    mount_happy_path(&server, &endpoints).await;

    // The final fetch must present every cookie collected along the way.
    Mock::given(method("GET"))
        .and(path("/jcxx/xsxx/StudentInformation.aspx"))
        .and(query_param("id", "77"))
        .and(header("cookie", "A=1; B=2; C=3; D=4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>student record</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = network_client::build_client().unwrap();
    let solver = FixedSolver("abcd");
    let mut session = network_client::login(&client, &endpoints, &solver, "102300001", "hunter2")
        .await
        .unwrap();

    assert_eq!(session.user_id, "77");
    assert_eq!(session.cookies.get("A"), Some("1"));
    assert_eq!(session.cookies.get("D"), Some("4"));

    let page = network_client::fetch_student_info(&client, &endpoints, &mut session)
        .await
        .unwrap();
    assert_eq!(page, "<html>student record</html>");
}

#[tokio::test]
async fn keepalive_probe_accepts_live_session() {
    let server = MockServer::start().await;
    let endpoints = endpoints_for(&server);
    mount_happy_path(&server, &endpoints).await;

    Mock::given(method("GET"))
        .and(path("/top.aspx"))
        .and(query_param("id", "77"))
        .respond_with(ResponseTemplate::new(200).set_body_string("欢迎 当前用户: 102300001"))
        .mount(&server)
        .await;

    let client = network_client::build_client().unwrap();
    let solver = FixedSolver("abcd");
    let mut session = network_client::login(&client, &endpoints, &solver, "102300001", "hunter2")
        .await
        .unwrap();

    network_client::check_session(&client, &endpoints, &mut session)
        .await
        .unwrap();
}

#[tokio::test]
async fn missing_token_surfaces_as_incomplete_auth_flow() {
    let server = MockServer::start().await;
    let endpoints = endpoints_for(&server);

    Mock::given(method("GET"))
        .and(path("/plus/verifycode.asp"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CAPTCHA_BYTES))
        .mount(&server)
        .await;

    // Wrong password and expired CAPTCHA both look like this: a page with
    // no token assignment at all.
    Mock::given(method("POST"))
        .and(path("/logincheck.asp"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>验证码错误</html>"))
        .mount(&server)
        .await;

    let client = network_client::build_client().unwrap();
    let solver = FixedSolver("abcd");
    let err = network_client::login(&client, &endpoints, &solver, "102300001", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, NetworkError::AuthFlowIncomplete(_)));
    assert!(err.to_string().contains("authentication flow did not complete"));
}

#[tokio::test]
async fn sso_rejection_is_a_typed_error() {
    let server = MockServer::start().await;
    let endpoints = endpoints_for(&server);

    Mock::given(method("GET"))
        .and(path("/plus/verifycode.asp"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CAPTCHA_BYTES))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/logincheck.asp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            r#"var token = "T1";"#,
            "window.location.href =  'loginchk_xs.aspx?id=5&num=9&x=y';",
        )))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/Sfrz/SSOLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"code":400,"info":"account not found"}"#))
        .mount(&server)
        .await;

    let client = network_client::build_client().unwrap();
    let solver = FixedSolver("abcd");
    let err = network_client::login(&client, &endpoints, &solver, "102300001", "hunter2")
        .await
        .unwrap_err();

    match err {
        NetworkError::SsoRejected { code, info } => {
            assert_eq!(code, 400);
            assert_eq!(info, "account not found");
        }
        other => panic!("expected SsoRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn relogin_page_surfaces_as_session_expired() {
    let server = MockServer::start().await;
    let endpoints = endpoints_for(&server);
    mount_happy_path(&server, &endpoints).await;

    Mock::given(method("GET"))
        .and(path("/jcxx/xsxx/StudentInformation.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("会话超时，请重新登录"))
        .mount(&server)
        .await;

    let client = network_client::build_client().unwrap();
    let solver = FixedSolver("abcd");
    let mut session = network_client::login(&client, &endpoints, &solver, "102300001", "hunter2")
        .await
        .unwrap();

    let err = network_client::fetch_student_info(&client, &endpoints, &mut session)
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkError::SessionExpired));
}
