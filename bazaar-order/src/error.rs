/// Failures surfaced by the order lifecycle and reporting operations.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("User not authenticated")]
    Unauthenticated,

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrderError {
    /// Logs a storage/collaborator failure in full and wraps it. The message
    /// kept in the variant is only the operation name.
    pub fn internal(context: &str, err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        tracing::error!(error = %err, "{} failed", context);
        OrderError::Internal(context.to_string())
    }

    pub fn order_not_found(id: uuid::Uuid) -> Self {
        OrderError::NotFound(format!("Order not found: {}", id))
    }
}
