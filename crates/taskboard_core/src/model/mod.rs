mod activity;
mod notification;
mod profile;
mod task;

pub use activity::{Activity, ActivityKind};
pub use notification::{ActionCode, ActionStyle, Notification, NotificationAction, NotificationKind};
pub use profile::{Session, UserAccount, UserProfile};
pub use task::{Reminder, Task};
