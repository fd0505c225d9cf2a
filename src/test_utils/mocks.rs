//! Mock provider and InfluxDB servers.
//!
//! [`MockBrunataServerBuilder`] serves both the identity broker (under
//! `/tenant`) and the data API from one wiremock server, so a single
//! [`ProviderEndpoints`] can point the whole flow at it.

use crate::brunata::{HttpGateway, ProviderEndpoints, ReqwestGateway};
use crate::model::Category;
use crate::test_utils::fixtures::authorize_page;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{
    body_string_contains, header, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_POLICY: &str = "B2C_1_signin_username";
pub const TEST_CLIENT_ID: &str = "test-client";
const HANDSHAKE_CODE: &str = "code-1";

/// A gateway over a fresh pool configured like production.
pub fn test_gateway() -> Arc<dyn HttpGateway> {
    let client = ReqwestGateway::shared_client(Duration::from_secs(10)).unwrap();
    Arc::new(ReqwestGateway::new(client))
}

/// Builder for a wiremock server that plays the provider.
pub struct MockBrunataServerBuilder {
    server: MockServer,
}

impl MockBrunataServerBuilder {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Endpoints rooted at this server.
    pub fn endpoints(&self) -> ProviderEndpoints {
        ProviderEndpoints::new(
            &self.url(),
            &format!("{}/tenant", self.url()),
            TEST_POLICY,
            TEST_CLIENT_ID,
        )
        .unwrap()
    }

    /// Fails the test if any `expect` count was not met.
    pub async fn verify(&self) {
        self.server.verify().await;
    }

    fn policy_path(suffix: &str) -> String {
        format!("/tenant/{}/{}", TEST_POLICY, suffix)
    }

    async fn mount(self, mock: Mock) -> Self {
        mock.mount(&self.server).await;
        self
    }

    pub async fn mock_authorize(self, trans_id: &str, csrf: &str) -> Self {
        let response = ResponseTemplate::new(200)
            .set_body_string(authorize_page(trans_id))
            .append_header("set-cookie", format!("x-ms-cpim-csrf={}; Path=/", csrf).as_str())
            .append_header("set-cookie", "x-ms-cpim-trans=trans-cookie; Path=/");
        self.mount(
            Mock::given(method("GET"))
                .and(path(Self::policy_path("oauth2/v2.0/authorize")))
                .and(query_param("client_id", TEST_CLIENT_ID))
                .and(query_param("code_challenge_method", "S256"))
                .respond_with(response),
        )
        .await
    }

    pub async fn mock_authorize_without_cookie(self, trans_id: &str) -> Self {
        self.mount(
            Mock::given(method("GET"))
                .and(path(Self::policy_path("oauth2/v2.0/authorize")))
                .respond_with(ResponseTemplate::new(200).set_body_string(authorize_page(trans_id))),
        )
        .await
    }

    pub async fn mock_authorize_body(self, body: &str, csrf: &str) -> Self {
        let response = ResponseTemplate::new(200)
            .set_body_string(body)
            .append_header("set-cookie", format!("x-ms-cpim-csrf={}; Path=/", csrf).as_str());
        self.mount(
            Mock::given(method("GET"))
                .and(path(Self::policy_path("oauth2/v2.0/authorize")))
                .respond_with(response),
        )
        .await
    }

    pub async fn mock_authorize_status(self, status: u16) -> Self {
        self.mount(
            Mock::given(method("GET"))
                .and(path(Self::policy_path("oauth2/v2.0/authorize")))
                .respond_with(ResponseTemplate::new(status)),
        )
        .await
    }

    pub async fn mock_submit_success(self) -> Self {
        self.mount(
            Mock::given(method("POST"))
                .and(path(Self::policy_path("SelfAsserted")))
                .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"200"}"#)),
        )
        .await
    }

    /// Credential submit that only answers when the handshake state is
    /// carried over from the authorize page.
    pub async fn mock_submit_expecting(self, trans_id: &str, csrf: &str) -> Self {
        self.mount(
            Mock::given(method("POST"))
                .and(path(Self::policy_path("SelfAsserted")))
                .and(query_param("tx", trans_id))
                .and(query_param("p", TEST_POLICY))
                .and(header("x-csrf-token", csrf))
                .and(header_regex("cookie", &format!("x-ms-cpim-csrf={}", csrf)))
                .and(header_regex("cookie", "x-ms-cpim-trans=trans-cookie"))
                .and(body_string_contains("request_type=RESPONSE"))
                .and(body_string_contains("logonIdentifier=user%40example.com"))
                .and(body_string_contains("password=secret"))
                .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"200"}"#))
                .expect(1),
        )
        .await
    }

    pub async fn mock_submit_rejected(self) -> Self {
        self.mount(
            Mock::given(method("POST"))
                .and(path(Self::policy_path("SelfAsserted")))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"{"status":"400","errorCode":"AADB2C90225","message":"The username or password provided in the request are invalid."}"#,
                )),
        )
        .await
    }

    pub async fn mock_submit_status(self, status: u16) -> Self {
        self.mount(
            Mock::given(method("POST"))
                .and(path(Self::policy_path("SelfAsserted")))
                .respond_with(ResponseTemplate::new(status)),
        )
        .await
    }

    /// Confirmation step redirecting to the app with `code`.
    pub async fn mock_confirmed(self, code: &str) -> Self {
        let location = format!("{}/auth-response?state=s&code={}", self.url(), code);
        self.mount(
            Mock::given(method("GET"))
                .and(path(Self::policy_path("api/CombinedSigninAndSignup/confirmed")))
                .and(query_param("rememberMe", "false"))
                .respond_with(ResponseTemplate::new(302).insert_header("location", location.as_str())),
        )
        .await
    }

    /// Like [`Self::mock_confirmed`], plus the page the redirect lands on.
    pub async fn mock_confirmed_landing(self, code: &str) -> Self {
        let server = self.mock_confirmed(code).await;
        server
            .mount(
                Mock::given(method("GET"))
                    .and(path("/auth-response"))
                    .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>")),
            )
            .await
    }

    pub async fn mock_confirmed_error(self, description: &str) -> Self {
        let mut location = reqwest::Url::parse(&format!("{}/auth-response", self.url())).unwrap();
        location
            .query_pairs_mut()
            .append_pair("error", "access_denied")
            .append_pair("error_description", description);
        self.mount(
            Mock::given(method("GET"))
                .and(path(Self::policy_path("api/CombinedSigninAndSignup/confirmed")))
                .respond_with(
                    ResponseTemplate::new(302).insert_header("location", location.as_str()),
                ),
        )
        .await
    }

    pub async fn mock_token_for_code(self, code: &str, body: &str) -> Self {
        self.mount(
            Mock::given(method("POST"))
                .and(path(Self::policy_path("oauth2/v2.0/token")))
                .and(body_string_contains("grant_type=authorization_code"))
                .and(body_string_contains(format!("code={}", code).as_str()))
                .and(body_string_contains("code_verifier="))
                .and(body_string_contains(format!("client_id={}", TEST_CLIENT_ID).as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(1),
        )
        .await
    }

    pub async fn mock_token_status(self, status: u16) -> Self {
        self.mount(
            Mock::given(method("POST"))
                .and(path(Self::policy_path("oauth2/v2.0/token")))
                .respond_with(ResponseTemplate::new(status).set_body_string(r#"{"error":"invalid_grant"}"#)),
        )
        .await
    }

    pub async fn mock_token_never_called(self) -> Self {
        self.mount(
            Mock::given(method("POST"))
                .and(path(Self::policy_path("oauth2/v2.0/token")))
                .respond_with(ResponseTemplate::new(500))
                .expect(0),
        )
        .await
    }

    pub async fn mock_token_refresh(self, refresh_token: &str, body: &str) -> Self {
        self.mount(
            Mock::given(method("POST"))
                .and(path(Self::policy_path("oauth2/v2.0/token")))
                .and(body_string_contains("grant_type=refresh_token"))
                .and(body_string_contains(format!("refresh_token={}", refresh_token).as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(1),
        )
        .await
    }

    pub async fn mock_token_refresh_status(self, refresh_token: &str, status: u16) -> Self {
        self.mount(
            Mock::given(method("POST"))
                .and(path(Self::policy_path("oauth2/v2.0/token")))
                .and(body_string_contains("grant_type=refresh_token"))
                .and(body_string_contains(format!("refresh_token={}", refresh_token).as_str()))
                .respond_with(ResponseTemplate::new(status))
                .expect(1),
        )
        .await
    }

    /// Every handshake step, each expected exactly `times` times, ending
    /// in a token response carrying `access_token`.
    pub async fn mock_full_handshake(self, access_token: &str, times: u64) -> Self {
        let body = format!(r#"{{"access_token":"{}","token_type":"Bearer"}}"#, access_token);
        self.mock_full_handshake_with(&body, times).await
    }

    pub async fn mock_full_handshake_with(self, token_body: &str, times: u64) -> Self {
        let location = format!("{}/auth-response?code={}", self.url(), HANDSHAKE_CODE);
        let authorize = ResponseTemplate::new(200)
            .set_body_string(authorize_page("tx-full"))
            .append_header("set-cookie", "x-ms-cpim-csrf=csrf-full; Path=/");

        self.mount(
            Mock::given(method("GET"))
                .and(path(Self::policy_path("oauth2/v2.0/authorize")))
                .respond_with(authorize)
                .expect(times),
        )
        .await
        .mount(
            Mock::given(method("POST"))
                .and(path(Self::policy_path("SelfAsserted")))
                .and(query_param("tx", "tx-full"))
                .and(header("x-csrf-token", "csrf-full"))
                .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"200"}"#))
                .expect(times),
        )
        .await
        .mount(
            Mock::given(method("GET"))
                .and(path(Self::policy_path("api/CombinedSigninAndSignup/confirmed")))
                .and(query_param("csrf_token", "csrf-full"))
                .respond_with(ResponseTemplate::new(302).insert_header("location", location.as_str()))
                .expect(times),
        )
        .await
        .mount(
            Mock::given(method("POST"))
                .and(path(Self::policy_path("oauth2/v2.0/token")))
                .and(body_string_contains("grant_type=authorization_code"))
                .and(body_string_contains(format!("code={}", HANDSHAKE_CODE).as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_string(token_body))
                .expect(times),
        )
        .await
    }

    pub async fn mock_meters(self, body: &str, times: u64) -> Self {
        self.mount(
            Mock::given(method("GET"))
                .and(path("/online-auth-webservice/v1/rest/consumer/meters"))
                .and(header("authorization", "Bearer fake"))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(times),
        )
        .await
    }

    pub async fn mock_meters_delayed(self, body: &str, delay: Duration) -> Self {
        self.mount(
            Mock::given(method("GET"))
                .and(path("/online-auth-webservice/v1/rest/consumer/meters"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(body)
                        .set_delay(delay),
                ),
        )
        .await
    }

    pub async fn mock_meters_status(self, status: u16) -> Self {
        self.mount(
            Mock::given(method("GET"))
                .and(path("/online-auth-webservice/v1/rest/consumer/meters"))
                .respond_with(ResponseTemplate::new(status)),
        )
        .await
    }

    pub async fn mock_consumption(self, category: Category, body: &str, times: u64) -> Self {
        self.mount(
            Mock::given(method("GET"))
                .and(path("/online-auth-webservice/v1/rest/consumer/consumption"))
                .and(query_param("allocationunit", category.allocation_unit()))
                .and(query_param("interval", "D"))
                .and(header("authorization", "Bearer fake"))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(times),
        )
        .await
    }

    pub async fn mock_consumption_status(self, category: Category, status: u16) -> Self {
        self.mount(
            Mock::given(method("GET"))
                .and(path("/online-auth-webservice/v1/rest/consumer/consumption"))
                .and(query_param("allocationunit", category.allocation_unit()))
                .respond_with(ResponseTemplate::new(status).set_body_string("error")),
        )
        .await
    }
}

/// Builder for a wiremock server that plays InfluxDB.
pub struct MockInfluxServerBuilder {
    server: MockServer,
}

impl MockInfluxServerBuilder {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Accepts exactly `times` writes.
    pub async fn mock_write_success(self, times: u64) -> Self {
        Mock::given(method("POST"))
            .and(path("/api/v2/write"))
            .and(query_param("bucket", "test-bucket"))
            .respond_with(ResponseTemplate::new(204))
            .expect(times)
            .mount(&self.server)
            .await;
        self
    }

    pub async fn mock_write_error(self, status: u16, body: &str) -> Self {
        Mock::given(method("POST"))
            .and(path("/api/v2/write"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
        self
    }

    pub async fn verify(&self) {
        self.server.verify().await;
    }
}
