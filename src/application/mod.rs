pub mod checkout_service;
pub mod invoice_service;
pub mod notification_service;
pub mod outbox_dispatcher;
pub mod payment_event_service;
pub mod shipment_service;

use crate::domain::errors::DomainError;

/// Repositories are synchronous (diesel); keep them off the async workers.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, DomainError>
where
    F: FnOnce() -> Result<T, DomainError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DomainError::Internal(e.to_string()))?
}
