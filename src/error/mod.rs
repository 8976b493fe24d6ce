use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("Langbase error: {0}")]
    Langbase(#[from] LangbaseError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Structural misuse of the reasoning engine. These always reach the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReasoningError {
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Node not found: {node_id} (session {session_id})")]
    NodeNotFound { session_id: String, node_id: String },
}

/// Thought generation failures. Recovered locally as "zero children".
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Thought generation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Thought generation backend failed: {0}")]
    Langbase(#[from] LangbaseError),

    #[error("Invalid generator response: {message}")]
    InvalidResponse { message: String },

    #[error("Thought generation failed: {message}")]
    Failed { message: String },
}

/// Node evaluation failures. Recovered locally as a zero score.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluation failed for node {node_id}: {message}")]
    Failed { node_id: String, message: String },
}

/// Langbase API errors
#[derive(Debug, Error)]
pub enum LangbaseError {
    #[error("Langbase unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

impl From<ReasoningError> for McpError {
    fn from(err: ReasoningError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for reasoning engine operations
pub type ReasoningResult<T> = Result<T, ReasoningError>;

/// Result type alias for Langbase operations
pub type LangbaseResult<T> = Result<T, LangbaseError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
