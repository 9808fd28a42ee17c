//! Error types for a3s-intercept

use thiserror::Error;

/// Errors that can occur while building proxies or dispatching calls
#[derive(Debug, Error)]
pub enum InterceptError {
    /// Invalid or missing argument
    #[error("Argument error: {0}")]
    Argument(String),

    /// Target does not satisfy the required type or interface
    #[error("The target '{target}' doesn't implement '{required}'")]
    TargetMismatch {
        target: String,
        required: String,
    },

    /// Wrong class/interface shape for the requested creation mode
    #[error("Invalid shape for '{type_name}': {reason}")]
    InvalidShape {
        type_name: String,
        reason: String,
    },

    /// Class proxy requested for a type without a usable constructor
    #[error("Type '{0}' has no usable constructor")]
    NoConstructor(String),

    /// Member not present on the proxy type
    #[error("Member '{member}' not found on '{type_name}'")]
    MemberNotFound {
        type_name: String,
        member: String,
    },

    /// Wrong number of arguments for a member
    #[error("Member '{member}' expects {expected} argument(s), got {actual}")]
    Arity {
        member: String,
        expected: usize,
        actual: usize,
    },

    /// Wrong number of generic arguments for a generic method
    #[error("Member '{member}' expects {expected} generic argument(s), got {actual}")]
    GenericArity {
        member: String,
        expected: usize,
        actual: usize,
    },

    /// Return value could not be cast to the member's declared type
    #[error("Member '{member}' returned {actual}, expected {expected}")]
    ReturnType {
        member: String,
        expected: String,
        actual: String,
    },

    /// Awaitable API used on a synchronous member (or the reverse)
    #[error("Member '{0}' is not awaitable")]
    NotAwaitable(String),

    /// Member is awaitable and must be called through the async surface
    #[error("Member '{0}' is awaitable; use the async call surface")]
    Awaitable(String),

    /// Declarative binding refers to something the type does not have
    #[error("Binding error on '{type_name}': {reason}")]
    Binding {
        type_name: String,
        reason: String,
    },

    /// Interceptor provider not registered with the factory
    #[error("Unknown interceptor provider: {0}")]
    UnknownProvider(String),

    /// Build plan rejected by the synthesis backend
    #[error("Synthesis failed for '{type_name}': {reason}")]
    Synthesis {
        type_name: String,
        reason: String,
    },

    /// Instantiation of a synthesized type failed
    #[error("Unable to create an instance for '{type_name}': {source}")]
    Construction {
        type_name: String,
        #[source]
        source: Box<InterceptError>,
    },

    /// Configuration or manifest error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Registry lock poisoned or otherwise unusable
    #[error("Registry error: {0}")]
    Registry(String),

    /// Failure raised by an interceptor or a real implementation
    #[error("{0}")]
    Custom(String),
}

impl InterceptError {
    /// Shorthand for failures raised by interceptors and implementations
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

/// Result type alias for interception operations
pub type Result<T> = std::result::Result<T, InterceptError>;
