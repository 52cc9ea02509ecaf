mod store;
mod types;

pub use store::{NotificationStore, PgNotificationStore, StoreError};
pub use types::{Category, Notification, Priority, Status};
