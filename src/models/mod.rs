pub mod backup;
pub mod notification;

pub use backup::{Backup, BackupStatus};
pub use notification::{Notification, NotificationStatus, NotificationType};
