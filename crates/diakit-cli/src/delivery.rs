//! Terminal-backed notification delivery.

use diakit_core::{AlertKey, NotificationDelivery, Trigger};

/// Prints immediate alerts to stderr and reports future deliveries as
/// armed. Stands in for a platform notification center.
pub struct ConsoleDelivery;

impl NotificationDelivery for ConsoleDelivery {
    fn schedule(
        &self,
        title: &str,
        body: &str,
        trigger: Option<Trigger>,
        key: &AlertKey,
    ) -> Option<String> {
        match trigger {
            None => eprintln!("[notify] {title}: {body}"),
            Some(Trigger::At(when)) => eprintln!("[notify] armed '{title}' for {when} ({key})"),
        }
        Some(key.to_string())
    }

    fn cancel(&self, _key: &AlertKey) {}

    fn cancel_all(&self) {}

    fn request_permissions(&self) -> bool {
        true
    }
}
