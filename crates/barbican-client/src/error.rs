use thiserror::Error;

/// Errors returned by the Barbican client
#[derive(Debug, Error)]
pub enum Error {
    /// A user-settable attribute was changed after the entity was submitted
    #[error("attribute '{attribute}' is immutable once the entity has been stored")]
    Immutable { attribute: String },

    /// A server-generated attribute was written
    #[error("attribute '{attribute}' is generated by the server and cannot be set")]
    ReadOnlyAttribute { attribute: String },

    /// The entity has no attribute with this name
    #[error("{entity} has no attribute '{attribute}'")]
    UnknownAttribute { entity: String, attribute: String },

    /// A reference was not a full resource URL ending in a UUID
    #[error("{entity} reference '{reference}' is incorrectly specified")]
    InvalidReference { entity: String, reference: String },

    /// An empty reference was passed where one is required
    #[error("{entity} reference is required")]
    MissingReference { entity: String },

    /// The response discriminator names a variant this client does not know
    #[error("unknown {entity} type '{type_name}'")]
    UnsupportedType { entity: String, type_name: String },

    /// `submit()`/`store()` called on an entity that already has an href
    #[error("entity has already been stored as {href}")]
    AlreadySubmitted { href: String },

    /// Operation not permitted in the entity's current state
    #[error("invalid entity state: {0}")]
    InvalidState(String),

    /// Operation requires an href the entity does not have yet
    #[error("{entity} is not yet stored")]
    NotStored { entity: String },

    /// Secret payload missing or unusable
    #[error("payload error: {0}")]
    Payload(String),

    /// A container already holds a secret under this name
    #[error("a secret named '{name}' already exists in the container")]
    DuplicateSecret { name: String },

    /// Operation not supported by this entity variant
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The remote resource does not exist (HTTP 404)
    #[error("not found: {href}: {message}")]
    NotFound { href: String, message: String },

    /// Any other non-2xx response
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Request could not be sent or the body could not be read
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a body this client cannot interpret
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Client construction failed
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn invalid_reference(entity: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::InvalidReference {
            entity: entity.into(),
            reference: reference.into(),
        }
    }

    pub(crate) fn unsupported_type(entity: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            entity: entity.into(),
            type_name: type_name.into(),
        }
    }

    pub(crate) fn missing_field(field: &str) -> Self {
        Self::InvalidResponse(format!("response is missing '{field}'"))
    }

    /// Build the error for a non-2xx response
    pub fn from_status(status: u16, href: impl Into<String>, message: impl Into<String>) -> Self {
        if status == 404 {
            Self::NotFound {
                href: href.into(),
                message: message.into(),
            }
        } else {
            Self::Http {
                status,
                message: message.into(),
            }
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Http { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// 401 Unauthorized
    pub fn is_auth_error(&self) -> bool {
        self.status() == Some(401)
    }

    /// Any 4xx response, including 401 and 404
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(400..=499))
    }

    /// Any 5xx response
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    /// Short class name used when reporting errors to a terminal
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Immutable { .. } => "ImmutableError",
            Self::ReadOnlyAttribute { .. } | Self::UnknownAttribute { .. } => "AttributeError",
            Self::InvalidReference { .. } | Self::MissingReference { .. } => "ValueError",
            Self::UnsupportedType { .. } => "UnsupportedTypeError",
            Self::AlreadySubmitted { .. } | Self::InvalidState(_) | Self::NotStored { .. } => {
                "StateError"
            }
            Self::Payload(_) => "PayloadError",
            Self::DuplicateSecret { .. } | Self::UnsupportedOperation(_) => "ContainerError",
            Self::NotFound { .. } => "NotFoundError",
            Self::Http { status: 401, .. } => "HTTPAuthError",
            Self::Http { status, .. } if *status >= 500 => "HTTPServerError",
            Self::Http { .. } => "HTTPClientError",
            Self::Request(_) => "RequestError",
            Self::InvalidResponse(_) => "ResponseError",
            Self::Config(_) => "ConfigError",
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;
