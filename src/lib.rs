//! Admin client for Firebase Auth multi-tenancy, plus the password hash
//! descriptors used when importing users.

mod auth;
pub mod error;
mod http_client;
pub mod json;
pub mod tenant_management;
pub mod user_import_hash;

pub use auth::{
    is_insufficient_permission, is_invalid_page_token, is_project_not_found, is_tenant_not_found,
    Client, Config,
};
pub use error::{Error, FirebaseError, FirebaseErrorCode, Result};
pub use http_client::{Request, Response, StaticToken, TokenSource, Transport};
pub use json::JsonObject;
pub use tenant_management::{
    ListTenantsOptions, Tenant, TenantArgs, TenantIterator, TenantManager, TenantsPage,
};
pub use tokio_util::sync::CancellationToken;
pub use user_import_hash::UserImportHash;
