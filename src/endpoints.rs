use url::Url;

/// The portal URL set for one login flow.
///
/// Defaults point at the real jwch hosts. `rooted_at` rebases every endpoint
/// onto a single origin, which is how the tests point the flow at a mock
/// server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub verify_code: Url,
    pub login_check: Url,
    pub sso_login: Url,
    pub session_check: Url,
    pub student_info: Url,
    pub keepalive: Url,
    /// Referer/Origin the login-check endpoint insists on.
    pub login_referer: String,
    /// Referer for everything behind the session host.
    pub session_referer: String,
    /// `ssourl` query parameter of the session-check request.
    pub sso_url: String,
    /// `hosturl` query parameter of the session-check request.
    pub host_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            verify_code: Url::parse("https://jwcjwxt1.fzu.edu.cn/plus/verifycode.asp")
                .expect("verify code URL"),
            login_check: Url::parse("https://jwcjwxt1.fzu.edu.cn/logincheck.asp")
                .expect("login check URL"),
            sso_login: Url::parse("https://jwcjwxt2.fzu.edu.cn/Sfrz/SSOLogin")
                .expect("SSO login URL"),
            session_check: Url::parse("https://jwcjwxt2.fzu.edu.cn:81/loginchk_xs.aspx")
                .expect("session check URL"),
            student_info: Url::parse(
                "https://jwcjwxt2.fzu.edu.cn:81/jcxx/xsxx/StudentInformation.aspx",
            )
            .expect("student info URL"),
            keepalive: Url::parse("https://jwcjwxt2.fzu.edu.cn:81/top.aspx")
                .expect("keepalive URL"),
            login_referer: "https://jwch.fzu.edu.cn".to_string(),
            session_referer: "https://jwcjwxt1.fzu.edu.cn/".to_string(),
            sso_url: "https://jwcjwxt2.fzu.edu.cn".to_string(),
            host_url: "https://jwcjwxt2.fzu.edu.cn:81".to_string(),
        }
    }
}

impl Endpoints {
    /// Rebases the whole endpoint set onto `base`.
    pub fn rooted_at(base: &Url) -> Result<Endpoints, url::ParseError> {
        let origin = base.origin().unicode_serialization();
        Ok(Endpoints {
            verify_code: base.join("/plus/verifycode.asp")?,
            login_check: base.join("/logincheck.asp")?,
            sso_login: base.join("/Sfrz/SSOLogin")?,
            session_check: base.join("/loginchk_xs.aspx")?,
            student_info: base.join("/jcxx/xsxx/StudentInformation.aspx")?,
            keepalive: base.join("/top.aspx")?,
            login_referer: origin.clone(),
            session_referer: format!("{}/", origin),
            sso_url: origin.clone(),
            host_url: origin,
        })
    }
}
