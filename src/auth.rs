use std::sync::Arc;

use url::Url;

use super::error::{Error, Result};
use super::http_client::{AuthHttpClient, StaticToken, TokenSource, Transport};
use super::tenant_management::TenantManager;

pub(crate) const AUTH_ERROR_CODE: &str = "authErrorCode";
const EMULATOR_HOST_ENV_VAR: &str = "FIREBASE_AUTH_EMULATOR_HOST";
const EMULATOR_TOKEN: &str = "owner";
const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com";

pub(crate) const TENANT_NOT_FOUND: &str = "TENANT_NOT_FOUND";
pub(crate) const INVALID_PAGE_SELECTION: &str = "INVALID_PAGE_SELECTION";
pub(crate) const INSUFFICIENT_PERMISSION: &str = "INSUFFICIENT_PERMISSION";
pub(crate) const PROJECT_NOT_FOUND: &str = "PROJECT_NOT_FOUND";
pub(crate) const CONFIGURATION_NOT_FOUND: &str = "CONFIGURATION_NOT_FOUND";

pub struct Config {
    pub http_client: Arc<dyn Transport>,
    pub project_id: String,
    pub token_source: Option<Arc<dyn TokenSource>>,
    pub version: String,
    /// Overrides the Identity Toolkit root URL, and the emulator host.
    pub endpoint: Option<String>,
}

impl Config {
    pub fn new<S: Into<String>>(project_id: S) -> Self {
        Self {
            http_client: Arc::new(reqwest::Client::default()),
            project_id: project_id.into(),
            token_source: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            endpoint: None,
        }
    }
}

/// Entry point for the Firebase Auth admin APIs of a single project.
pub struct Client {
    tenant_manager: TenantManager,
}

impl Client {
    pub fn new(conf: Config) -> Result<Self> {
        if conf.project_id.is_empty() {
            return Err(Error::invalid_argument("project id not available"));
        }

        let emulator_host = std::env::var(EMULATOR_HOST_ENV_VAR)
            .ok()
            .filter(|host| !host.is_empty());

        let (root, token_source) = match (conf.endpoint, emulator_host) {
            (Some(endpoint), _) => (endpoint, conf.token_source),
            (None, Some(host)) => {
                tracing::debug!(%host, "using the Firebase Auth emulator");
                let token: Arc<dyn TokenSource> = Arc::new(StaticToken::new(EMULATOR_TOKEN));
                (
                    format!("http://{}/identitytoolkit.googleapis.com", host),
                    Some(token),
                )
            }
            (None, None) => (DEFAULT_AUTH_URL.to_string(), conf.token_source),
        };

        let tenant_management_endpoint = Url::parse(&format!(
            "{}/v2/projects/{}/tenants",
            root.trim_end_matches('/'),
            conf.project_id
        ))?;

        let http_client = AuthHttpClient::new(conf.http_client, token_source, &conf.version)?;

        Ok(Self {
            tenant_manager: TenantManager::new(tenant_management_endpoint, http_client),
        })
    }

    pub fn tenant_manager(&self) -> &TenantManager {
        &self.tenant_manager
    }
}

pub fn is_tenant_not_found(e: &Error) -> bool {
    has_auth_error_code(e, TENANT_NOT_FOUND)
}

pub fn is_invalid_page_token(e: &Error) -> bool {
    has_auth_error_code(e, INVALID_PAGE_SELECTION)
}

pub fn is_insufficient_permission(e: &Error) -> bool {
    has_auth_error_code(e, INSUFFICIENT_PERMISSION)
}

pub fn is_project_not_found(e: &Error) -> bool {
    has_auth_error_code(e, PROJECT_NOT_FOUND) || has_auth_error_code(e, CONFIGURATION_NOT_FOUND)
}

pub(crate) fn has_auth_error_code<C>(e: &Error, code: C) -> bool
where
    C: Into<serde_json::Value>,
{
    match e {
        Error::Firebase(fe) => fe.ext.get(AUTH_ERROR_CODE) == Some(&code.into()),
        _ => false,
    }
}
