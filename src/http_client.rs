use std::sync::Arc;

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::auth::{
    AUTH_ERROR_CODE, CONFIGURATION_NOT_FOUND, INSUFFICIENT_PERMISSION, INVALID_PAGE_SELECTION,
    PROJECT_NOT_FOUND, TENANT_NOT_FOUND,
};
use super::error::{Error, FirebaseError, FirebaseErrorCode, Result};
use super::json_object;

const CLIENT_VERSION_HEADER: &str = "x-client-version";
const CREDENTIALS_FAILED: &str = "failed to obtain credentials";
const SEND_FAILED: &str = "failed to send request";

/// Auth-specific server codes and the messages surfaced for them.
const AUTH_ERRORS: [(&str, &str); 5] = [
    (TENANT_NOT_FOUND, "no tenant found for the given identifier"),
    (INVALID_PAGE_SELECTION, "invalid page token"),
    (
        INSUFFICIENT_PERMISSION,
        "credential used to init the SDK has insufficient permissions",
    ),
    (PROJECT_NOT_FOUND, "no project or configuration found"),
    (CONFIGURATION_NOT_FOUND, "no project or configuration found"),
];

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Moves a prepared request over the wire. Implementations must be safe to
/// share across tasks.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

#[async_trait::async_trait]
impl Transport for reqwest::Client {
    async fn send(&self, request: Request) -> Result<Response> {
        let mut builder = self
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        Ok(Response { status, body })
    }
}

/// Supplies OAuth2 access tokens for outgoing calls.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String>;
}

pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.token.to_owned())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: ErrorDetails,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetails {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

pub(crate) struct AuthHttpClient {
    transport: Arc<dyn Transport>,
    token_source: Option<Arc<dyn TokenSource>>,
    client_version: HeaderValue,
}

impl AuthHttpClient {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        token_source: Option<Arc<dyn TokenSource>>,
        version: &str,
    ) -> Result<Self> {
        Ok(Self {
            transport,
            token_source,
            client_version: HeaderValue::from_str(&format!("Rust/Admin/{}", version))?,
        })
    }

    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T> {
        let response = self.round_trip(method, url, body, cancel).await?;

        serde_json::from_slice(&response.body).map_err(|e| {
            FirebaseError::new(
                FirebaseErrorCode::Unknown,
                format!("error while parsing response: {}", e),
            )
            .into()
        })
    }

    pub(crate) async fn call_no_content(
        &self,
        method: Method,
        url: Url,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        self.round_trip(method, url, None, cancel).await?;
        Ok(())
    }

    async fn round_trip(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Response> {
        let exchange = self.exchange(method, url, body);

        let response = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(Error::Cancelled),
                    response = exchange => response?,
                }
            }
            None => exchange.await?,
        };

        if !response.status.is_success() {
            let err = error_from_response(&response);
            tracing::debug!(
                status = response.status.as_u16(),
                auth_error_code = ?err.ext.get(AUTH_ERROR_CODE),
                "identity toolkit returned an error"
            );
            return Err(err.into());
        }

        Ok(response)
    }

    async fn exchange(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(CLIENT_VERSION_HEADER),
            self.client_version.clone(),
        );

        if let Some(ref source) = self.token_source {
            let value = bearer(source.as_ref())
                .await
                .map_err(service_error(FirebaseErrorCode::Unauthenticated, CREDENTIALS_FAILED))?;
            headers.insert(AUTHORIZATION, value);
        }

        tracing::debug!(%method, %url, "sending identity toolkit request");

        let request = Request {
            method,
            url,
            headers,
            body,
        };

        self.transport
            .send(request)
            .await
            .map_err(service_error(FirebaseErrorCode::Unavailable, SEND_FAILED))
    }
}

async fn bearer(source: &dyn TokenSource) -> Result<HeaderValue> {
    let token = source.token().await?;
    Ok(HeaderValue::from_str(&format!("Bearer {}", token))?)
}

/// Folds local plumbing failures into the service error kind. Errors that
/// already carry a kind pass through.
fn service_error(
    error_code: FirebaseErrorCode,
    context: &'static str,
) -> impl FnOnce(Error) -> Error {
    move |e| match e {
        Error::Other(e) => FirebaseError::new(error_code, format!("{}: {:#}", context, e)).into(),
        e => e,
    }
}

fn error_from_response(response: &Response) -> FirebaseError {
    let parsed: ErrorResponse = serde_json::from_slice(&response.body).unwrap_or_default();

    let error_code = FirebaseErrorCode::from_platform_status(&parsed.error.status)
        .unwrap_or_else(|| FirebaseErrorCode::from_status(response.status));

    let (server_code, detail) = match parsed.error.message.split_once(':') {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (parsed.error.message.trim(), ""),
    };

    let known = AUTH_ERRORS
        .iter()
        .find(|(code, _)| !server_code.is_empty() && *code == server_code);

    match known {
        Some((code, message)) => {
            let string = if detail.is_empty() {
                format!("{} ({})", message, code)
            } else {
                format!("{} ({}): {}", message, code, detail)
            };

            FirebaseError {
                error_code,
                string,
                ext: json_object! { AUTH_ERROR_CODE => *code },
            }
        }
        None => FirebaseError::new(
            error_code,
            format!(
                "unexpected http response with status: {}; body: {}",
                response.status.as_u16(),
                String::from_utf8_lossy(&response.body)
            ),
        ),
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::testing::{FailingTransport, MockTransport};
    use super::*;
    use crate::auth::{
        is_insufficient_permission, is_invalid_page_token, is_project_not_found,
        is_tenant_not_found,
    };

    fn client(transport: Arc<dyn Transport>) -> AuthHttpClient {
        AuthHttpClient::new(
            transport,
            Some(Arc::new(StaticToken::new("secret"))),
            "9.9.9",
        )
        .unwrap()
    }

    fn url() -> Url {
        Url::parse("https://example.test/v2/projects/p/tenants").unwrap()
    }

    #[tokio::test]
    async fn attaches_client_version_and_credentials() {
        let transport = Arc::new(MockTransport::with_json(vec![json!({})]));
        let client = client(transport.clone());

        let _: serde_json::Value = client.call(Method::GET, url(), None, None).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let headers = &requests[0].headers;
        assert_eq!(headers[CLIENT_VERSION_HEADER], "Rust/Admin/9.9.9");
        assert_eq!(headers[AUTHORIZATION], "Bearer secret");
    }

    #[tokio::test]
    async fn translates_known_auth_errors() {
        let transport = Arc::new(MockTransport::default());
        transport.push(
            StatusCode::NOT_FOUND,
            json!({
                "error": {
                    "code": 404,
                    "message": "TENANT_NOT_FOUND : tenant-x",
                    "status": "NOT_FOUND",
                }
            }),
        );
        let client = client(transport);

        let err = client
            .call_no_content(Method::DELETE, url(), None)
            .await
            .unwrap_err();

        match err {
            Error::Firebase(fe) => {
                assert_eq!(fe.code(), FirebaseErrorCode::NotFound);
                assert_eq!(
                    fe.message(),
                    "no tenant found for the given identifier (TENANT_NOT_FOUND): tenant-x"
                );
                assert_eq!(fe.ext()[AUTH_ERROR_CODE], json!(TENANT_NOT_FOUND));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn falls_back_to_http_status_for_unknown_bodies() {
        let transport = Arc::new(MockTransport::default());
        transport.push(StatusCode::SERVICE_UNAVAILABLE, json!("busy"));
        let client = client(transport);

        let err = client
            .call_no_content(Method::GET, url(), None)
            .await
            .unwrap_err();

        match err {
            Error::Firebase(fe) => {
                assert_eq!(fe.code(), FirebaseErrorCode::Unavailable);
                assert!(fe.message().contains("status: 503"));
                assert!(fe.ext().is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn transport_failures_become_service_errors() {
        let client = client(Arc::new(FailingTransport));

        let err = client
            .call_no_content(Method::GET, url(), None)
            .await
            .unwrap_err();

        match err {
            Error::Firebase(fe) => assert_eq!(fe.code(), FirebaseErrorCode::Unavailable),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_service_error() {
        let transport = Arc::new(MockTransport::default());
        transport.push(StatusCode::OK, json!("not an object"));
        let client = client(transport);

        let err = client
            .call::<ErrorDetails>(Method::GET, url(), None, None)
            .await
            .unwrap_err();

        match err {
            Error::Firebase(fe) => assert_eq!(fe.code(), FirebaseErrorCode::Unknown),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    struct FailingTokenSource;

    #[async_trait::async_trait]
    impl TokenSource for FailingTokenSource {
        async fn token(&self) -> Result<String> {
            Err(anyhow::anyhow!("metadata server unreachable").into())
        }
    }

    #[tokio::test]
    async fn credential_failures_become_service_errors() {
        let transport = Arc::new(MockTransport::with_json(vec![json!({})]));
        let client = AuthHttpClient::new(
            transport.clone(),
            Some(Arc::new(FailingTokenSource)),
            "9.9.9",
        )
        .unwrap();

        let err = client
            .call_no_content(Method::GET, url(), None)
            .await
            .unwrap_err();

        match err {
            Error::Firebase(fe) => {
                assert_eq!(fe.code(), FirebaseErrorCode::Unauthenticated);
                assert!(fe.message().contains("metadata server unreachable"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn unusable_token_is_a_service_error() {
        let transport = Arc::new(MockTransport::with_json(vec![json!({})]));
        let client = AuthHttpClient::new(
            transport.clone(),
            Some(Arc::new(StaticToken::new("bad\ntoken"))),
            "9.9.9",
        )
        .unwrap();

        let err = client
            .call_no_content(Method::GET, url(), None)
            .await
            .unwrap_err();

        match err {
            Error::Firebase(fe) => assert_eq!(fe.code(), FirebaseErrorCode::Unauthenticated),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn maps_each_auth_error_code() {
        type Predicate = fn(&Error) -> bool;
        let cases: [(&str, &str, FirebaseErrorCode, Predicate); 4] = [
            (
                "INVALID_PAGE_SELECTION",
                "INVALID_ARGUMENT",
                FirebaseErrorCode::InvalidArgument,
                is_invalid_page_token,
            ),
            (
                "INSUFFICIENT_PERMISSION",
                "PERMISSION_DENIED",
                FirebaseErrorCode::PermissionDenied,
                is_insufficient_permission,
            ),
            (
                "PROJECT_NOT_FOUND",
                "NOT_FOUND",
                FirebaseErrorCode::NotFound,
                is_project_not_found,
            ),
            (
                "CONFIGURATION_NOT_FOUND",
                "NOT_FOUND",
                FirebaseErrorCode::NotFound,
                is_project_not_found,
            ),
        ];

        for (server_code, status, error_code, predicate) in cases {
            let transport = Arc::new(MockTransport::default());
            transport.push(
                StatusCode::BAD_REQUEST,
                json!({"error": {"message": server_code, "status": status}}),
            );
            let client = client(transport);

            let err = client
                .call_no_content(Method::GET, url(), None)
                .await
                .unwrap_err();

            assert!(predicate(&err), "{} not recognised", server_code);
            assert!(!is_tenant_not_found(&err));
            match err {
                Error::Firebase(fe) => {
                    assert_eq!(fe.code(), error_code);
                    assert_eq!(fe.ext()[AUTH_ERROR_CODE], json!(server_code));
                    assert!(fe.message().ends_with(&format!("({})", server_code)));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn http_status_decides_when_body_has_no_status() {
        let transport = Arc::new(MockTransport::default());
        transport.push(
            StatusCode::FORBIDDEN,
            json!({"error": {"message": "INSUFFICIENT_PERMISSION"}}),
        );
        let client = client(transport);

        let err = client
            .call_no_content(Method::GET, url(), None)
            .await
            .unwrap_err();

        assert!(is_insufficient_permission(&err));
        match err {
            Error::Firebase(fe) => assert_eq!(fe.code(), FirebaseErrorCode::PermissionDenied),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
