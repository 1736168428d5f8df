// # Notifier Trait
//
// Defines the interface for delivering change notifications.
//
// ## Implementations
//
// - HTTP messaging API: `cardwatch-notify-http` crate

use async_trait::async_trait;

/// Trait for notifier implementations
///
/// One call delivers one message. The engine serializes calls and inserts
/// the configured delay between them; implementations must not batch,
/// queue, or retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a single message
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The messaging API accepted the message
    /// - `Err(Error)`: Delivery failed (logged by the engine, never fatal)
    async fn send(&self, message: &str) -> Result<(), crate::Error>;

    /// Notifier name for logging
    fn notifier_name(&self) -> &'static str;
}
