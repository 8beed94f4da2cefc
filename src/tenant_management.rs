use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::anyhow;
use futures::Stream;
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::{Error, Result};
use super::http_client::AuthHttpClient;

const MAX_LIST_TENANTS_PAGE_SIZE: u32 = 100;

/// A tenant of a multi-tenant Identity Platform project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tenant {
    #[serde(rename = "name", deserialize_with = "tenant_id_from_name")]
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "allowPasswordSignup", default)]
    pub allow_password_sign_up: bool,
    #[serde(rename = "enableEmailLinkSignin", default)]
    pub enable_email_link_sign_in: bool,
    #[serde(rename = "enableAnonymousUser", default)]
    pub enable_anonymous_users: bool,
}

/// The server reports tenants as `projects/{project}/tenants/{id}`.
fn tenant_id_from_name<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    Ok(name.rsplit('/').next().unwrap_or_default().to_string())
}

/// Tenant properties for create and update calls. Unset fields are left out
/// of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TenantArgs {
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(
        rename = "allowPasswordSignup",
        skip_serializing_if = "Option::is_none"
    )]
    pub allow_password_sign_up: Option<bool>,
    #[serde(
        rename = "enableEmailLinkSignin",
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_email_link_sign_in: Option<bool>,
    #[serde(
        rename = "enableAnonymousUser",
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_anonymous_users: Option<bool>,
}

impl TenantArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn allow_password_sign_up(mut self, allow: bool) -> Self {
        self.allow_password_sign_up = Some(allow);
        self
    }

    pub fn enable_email_link_sign_in(mut self, enable: bool) -> Self {
        self.enable_email_link_sign_in = Some(enable);
        self
    }

    pub fn enable_anonymous_users(mut self, enable: bool) -> Self {
        self.enable_anonymous_users = Some(enable);
        self
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Wire names of the populated fields, sorted.
    pub fn update_mask(&self) -> Result<Vec<String>> {
        let mut mask: Vec<String> = match self.to_json()? {
            serde_json::Value::Object(fields) => fields.keys().cloned().collect(),
            _ => Vec::new(),
        };
        mask.sort();
        Ok(mask)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTenantsOptions {
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

impl ListTenantsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn page_token(mut self, page_token: impl Into<String>) -> Self {
        self.page_token = Some(page_token.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(size) = self.page_size {
            if size == 0 || size > MAX_LIST_TENANTS_PAGE_SIZE {
                return Err(Error::invalid_argument(format!(
                    "page size must be between 1 and {}",
                    MAX_LIST_TENANTS_PAGE_SIZE
                )));
            }
        }
        Ok(())
    }
}

/// One page of a tenant listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantsPage {
    pub tenants: Vec<Tenant>,
    /// `None` on the final page.
    pub next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ListTenantsResponse {
    #[serde(default)]
    tenants: Vec<Tenant>,
    #[serde(rename = "nextPageToken", default)]
    next_page_token: String,
}

/// Creates, reads, updates, deletes and lists tenants.
///
/// Every call goes to the service; nothing is cached. After [`close`] all
/// operations fail with [`Error::Closed`].
///
/// [`close`]: TenantManager::close
pub struct TenantManager {
    endpoint: Url,
    http_client: RwLock<Option<Arc<AuthHttpClient>>>,
}

impl TenantManager {
    pub(crate) fn new(endpoint: Url, http_client: AuthHttpClient) -> Self {
        Self {
            endpoint,
            http_client: RwLock::new(Some(Arc::new(http_client))),
        }
    }

    pub async fn get_tenant(
        &self,
        tenant_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Tenant> {
        let url = self.tenant_url(tenant_id)?;
        let http_client = self.http_client().await?;

        http_client.call(Method::GET, url, None, cancel).await
    }

    pub async fn create_tenant(
        &self,
        args: &TenantArgs,
        cancel: Option<&CancellationToken>,
    ) -> Result<Tenant> {
        let body = args.to_json()?;
        let http_client = self.http_client().await?;

        http_client
            .call(Method::POST, self.endpoint.clone(), Some(body), cancel)
            .await
    }

    /// Applies the populated fields of `args` to an existing tenant.
    pub async fn update_tenant(
        &self,
        tenant_id: &str,
        args: &TenantArgs,
        cancel: Option<&CancellationToken>,
    ) -> Result<Tenant> {
        let mut url = self.tenant_url(tenant_id)?;

        let mask = args.update_mask()?;
        if mask.is_empty() {
            return Err(Error::invalid_argument(
                "no parameters specified in the update request",
            ));
        }
        url.query_pairs_mut()
            .append_pair("updateMask", &mask.join(","));

        let body = args.to_json()?;
        let http_client = self.http_client().await?;

        http_client
            .call(Method::PATCH, url, Some(body), cancel)
            .await
    }

    pub async fn delete_tenant(
        &self,
        tenant_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let url = self.tenant_url(tenant_id)?;
        let http_client = self.http_client().await?;

        http_client
            .call_no_content(Method::DELETE, url, cancel)
            .await
    }

    /// Fetches a single page of tenants.
    pub async fn list_tenants_page(
        &self,
        options: &ListTenantsOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<TenantsPage> {
        options.validate()?;

        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            if let Some(size) = options.page_size {
                query.append_pair("pageSize", &size.to_string());
            }
            if let Some(token) = options.page_token.as_deref().filter(|t| !t.is_empty()) {
                query.append_pair("pageToken", token);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let http_client = self.http_client().await?;
        let response: ListTenantsResponse =
            http_client.call(Method::GET, url, None, cancel).await?;

        Ok(TenantsPage {
            tenants: response.tenants,
            next_page_token: Some(response.next_page_token).filter(|t| !t.is_empty()),
        })
    }

    /// Lazily walks all tenants, one page request at a time, starting from
    /// `options.page_token`.
    pub fn list_tenants(
        &self,
        options: ListTenantsOptions,
        cancel: Option<&CancellationToken>,
    ) -> TenantIterator<'_> {
        TenantIterator {
            manager: self,
            options,
            cancel: cancel.cloned(),
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Releases the transport handle. Calling it more than once is harmless.
    ///
    /// Calls already in flight hold their own reference and complete against
    /// the old handle, which is dropped once the last of them returns. Calls
    /// started after `close` returns fail with [`Error::Closed`].
    pub async fn close(&self) {
        self.http_client.write().await.take();
    }

    pub async fn is_closed(&self) -> bool {
        self.http_client.read().await.is_none()
    }

    async fn http_client(&self) -> Result<Arc<AuthHttpClient>> {
        self.http_client.read().await.clone().ok_or(Error::Closed)
    }

    fn tenant_url(&self, tenant_id: &str) -> Result<Url> {
        if tenant_id.is_empty() {
            return Err(Error::invalid_argument(
                "tenant id must be a non-empty string",
            ));
        }

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("invalid tenant management endpoint: {}", self.endpoint))?
            .push(tenant_id);

        Ok(url)
    }
}

/// Pull-based cursor over [`TenantManager::list_tenants`]. A page is only
/// requested once the previous one has been drained.
pub struct TenantIterator<'a> {
    manager: &'a TenantManager,
    options: ListTenantsOptions,
    cancel: Option<CancellationToken>,
    buffer: VecDeque<Tenant>,
    done: bool,
}

impl<'a> TenantIterator<'a> {
    /// Returns `None` once the last page is drained. A failed page request is
    /// yielded once and ends the sequence.
    pub async fn next(&mut self) -> Option<Result<Tenant>> {
        loop {
            if let Some(tenant) = self.buffer.pop_front() {
                return Some(Ok(tenant));
            }
            if self.done {
                return None;
            }

            let page = match self
                .manager
                .list_tenants_page(&self.options, self.cancel.as_ref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            tracing::trace!(
                count = page.tenants.len(),
                has_next = page.next_page_token.is_some(),
                "received tenants page"
            );

            self.buffer.extend(page.tenants);
            match page.next_page_token {
                Some(token) => self.options.page_token = Some(token),
                None => self.done = true,
            }
        }
    }

    /// Token to resume listing after the tenants handed out so far, when the
    /// current page has been fully consumed.
    pub fn page_token(&self) -> Option<&str> {
        if self.buffer.is_empty() && !self.done {
            self.options.page_token.as_deref()
        } else {
            None
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Tenant>> + 'a {
        futures::stream::unfold(self, |mut iter| async move {
            iter.next().await.map(|item| (item, iter))
        })
    }
}
