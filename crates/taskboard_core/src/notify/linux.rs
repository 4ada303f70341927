use crate::error::AppError;
use crate::model::Notification;
use crate::notify::{Alerter, open_task_view, view_action};

pub struct LinuxAlerter;

impl Alerter for LinuxAlerter {
    fn alert(&self, notification: &Notification) -> Result<(), AppError> {
        let mut desktop = notify_rust::Notification::new();
        desktop.summary(&format!("taskboard: {}", notification.title));
        desktop.body(&notification.message);

        let action = notification.task_id.as_deref().map(view_action);
        if let Some(action) = action.as_deref() {
            desktop.action(action, "View task");
        }

        let handle = desktop
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;

        if let (Some(action_key), Some(task_id)) = (action, notification.task_id.clone()) {
            std::thread::spawn(move || {
                handle.wait_for_action(|selected| {
                    if selected == action_key || selected == "default" {
                        let _ = open_task_view(&task_id);
                    }
                });
            });
        }

        Ok(())
    }
}
