//! Alert deduplication, composition and delivery.

mod dedup;
mod notifier;
pub mod templates;

pub use dedup::AlertDeduplicator;
pub use notifier::{LogNotifier, NotificationError, Notifier, WebhookNotifier};
