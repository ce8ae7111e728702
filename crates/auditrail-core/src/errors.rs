use auditrail_core_types::{RequestId, TraceId};
use thiserror::Error;

/// Result type alias using AuditError
pub type Result<T> = std::result::Result<T, AuditError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, testing, and external API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Structural/Validation
    InvalidInput,
    NotFound,
    UnknownType,

    // Registration / extraction scheme misconfiguration
    MissingAttribute,
    MissingAccessor,
    MissingSubAttribute,
    Configuration,

    // Integration/IO
    Io,
    Serialization,
    Persistence,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::UnknownType => "ERR_UNKNOWN_TYPE",
            ExErrorKind::MissingAttribute => "ERR_MISSING_ATTRIBUTE",
            ExErrorKind::MissingAccessor => "ERR_MISSING_ACCESSOR",
            ExErrorKind::MissingSubAttribute => "ERR_MISSING_SUB_ATTRIBUTE",
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// True for kinds that indicate a misconfigured registration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ExErrorKind::MissingAttribute
                | ExErrorKind::MissingAccessor
                | ExErrorKind::MissingSubAttribute
                | ExErrorKind::Configuration
        )
    }
}

/// Canonical structured error type
///
/// Carries a classification for programmatic handling plus the context
/// (operation, tracked item, request) needed when reading logs.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    item_type: Option<String>,
    item_id: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            item_type: None,
            item_id: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add tracked type context
    pub fn with_item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    /// Add tracked item id context
    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add trace ID context
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn item_type(&self) -> Option<&str> {
        self.item_type.as_deref()
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(item_type) = &self.item_type {
            write!(f, " (item_type: {})", item_type)?;
        }
        if let Some(item_id) = &self.item_id {
            write!(f, " (item_id: {})", item_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain errors raised by the capture pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    /// Extraction scheme names an attribute the entity does not expose
    #[error("{item_type} has no attribute '{attribute}'")]
    MissingAttribute { item_type: String, attribute: String },

    /// Extraction scheme names a derived accessor the entity does not expose
    #[error("{item_type} has no accessor '{accessor}'")]
    MissingAccessor { item_type: String, accessor: String },

    /// A collection item lacks one of the projected sub-attributes
    #[error("{item_type}.{attribute}[{index}] has no attribute '{sub_attribute}'")]
    MissingSubAttribute {
        item_type: String,
        attribute: String,
        index: usize,
        sub_attribute: String,
    },

    /// Tracked type name is not registered
    #[error("Unknown tracked type: {item_type}")]
    UnknownType { item_type: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<AuditError> for ExError {
    fn from(err: AuditError) -> Self {
        let message = err.to_string();
        match err {
            AuditError::MissingAttribute { item_type, .. } => {
                ExError::new(ExErrorKind::MissingAttribute)
                    .with_item_type(item_type)
                    .with_message(message)
            }
            AuditError::MissingAccessor { item_type, .. } => {
                ExError::new(ExErrorKind::MissingAccessor)
                    .with_item_type(item_type)
                    .with_message(message)
            }
            AuditError::MissingSubAttribute { item_type, .. } => {
                ExError::new(ExErrorKind::MissingSubAttribute)
                    .with_item_type(item_type)
                    .with_message(message)
            }
            AuditError::UnknownType { item_type } => ExError::new(ExErrorKind::UnknownType)
                .with_item_type(item_type)
                .with_message(message),
            AuditError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
            AuditError::Internal { .. } => ExError::new(ExErrorKind::Internal).with_message(message),
        }
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Serialization {
            message: err.to_string(),
        }
    }
}
