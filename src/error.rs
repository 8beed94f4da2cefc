use reqwest::StatusCode;

use super::json::JsonObject;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Firebase(#[from] FirebaseError),
    #[error("operation cancelled")]
    Cancelled,
    #[error("tenant manager has been closed")]
    Closed,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirebaseErrorCode {
    // InvalidArgument is a OnePlatform error code.
    InvalidArgument,

    // FailedPrecondition is a OnePlatform error code.
    FailedPrecondition,

    // OutOfRange is a OnePlatform error code.
    OutOfRange,

    // Unauthenticated is a OnePlatform error code.
    Unauthenticated,

    // PermissionDenied is a OnePlatform error code.
    PermissionDenied,

    // NotFound is a OnePlatform error code.
    NotFound,

    // Conflict stands in for bare HTTP 409 responses that carry no ABORTED or
    // ALREADY_EXISTS status.
    Conflict,

    // Aborted is a OnePlatform error code.
    Aborted,

    // AlreadyExists is a OnePlatform error code.
    AlreadyExists,

    // ResourceExhausted is a OnePlatform error code.
    ResourceExhausted,

    // Cancelled is a OnePlatform error code.
    Cancelled,

    // DataLoss is a OnePlatform error code.
    DataLoss,

    // Unknown is a OnePlatform error code.
    Unknown,

    // Internal is a OnePlatform error code.
    Internal,

    // Unavailable is a OnePlatform error code.
    Unavailable,

    // DeadlineExceeded is a OnePlatform error code.
    DeadlineExceeded,
}

impl FirebaseErrorCode {
    /// Maps an HTTP status to the closest OnePlatform code.
    pub(crate) fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            400 => Self::InvalidArgument,
            401 => Self::Unauthenticated,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::Conflict,
            412 => Self::FailedPrecondition,
            416 => Self::OutOfRange,
            429 => Self::ResourceExhausted,
            500 => Self::Internal,
            503 => Self::Unavailable,
            504 => Self::DeadlineExceeded,
            _ => Self::Unknown,
        }
    }

    /// Parses the `status` string of a OnePlatform error body.
    pub(crate) fn from_platform_status(status: &str) -> Option<Self> {
        let code = match status {
            "INVALID_ARGUMENT" => Self::InvalidArgument,
            "FAILED_PRECONDITION" => Self::FailedPrecondition,
            "OUT_OF_RANGE" => Self::OutOfRange,
            "UNAUTHENTICATED" => Self::Unauthenticated,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "NOT_FOUND" => Self::NotFound,
            "ABORTED" => Self::Aborted,
            "ALREADY_EXISTS" => Self::AlreadyExists,
            "RESOURCE_EXHAUSTED" => Self::ResourceExhausted,
            "CANCELLED" => Self::Cancelled,
            "DATA_LOSS" => Self::DataLoss,
            "UNKNOWN" => Self::Unknown,
            "INTERNAL" => Self::Internal,
            "UNAVAILABLE" => Self::Unavailable,
            "DEADLINE_EXCEEDED" => Self::DeadlineExceeded,
            _ => return None,
        };
        Some(code)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{string}")]
pub struct FirebaseError {
    pub(crate) error_code: FirebaseErrorCode,
    pub(crate) string: String,
    pub(crate) ext: JsonObject,
}

impl FirebaseError {
    pub(crate) fn new<S: Into<String>>(error_code: FirebaseErrorCode, string: S) -> Self {
        Self {
            error_code,
            string: string.into(),
            ext: JsonObject::new(),
        }
    }

    pub fn code(&self) -> FirebaseErrorCode {
        self.error_code
    }

    pub fn message(&self) -> &str {
        &self.string
    }

    /// Service-specific details, such as the `authErrorCode`.
    pub fn ext(&self) -> &JsonObject {
        &self.ext
    }
}

macro_rules! impl_other_error {
    ($err:ty) => {
        impl From<$err> for Error {
            fn from(e: $err) -> Self {
                Self::Other(anyhow::Error::new(e))
            }
        }
    };
}

impl_other_error!(reqwest::Error);
impl_other_error!(reqwest::header::InvalidHeaderValue);
impl_other_error!(serde_json::Error);
impl_other_error!(url::ParseError);
