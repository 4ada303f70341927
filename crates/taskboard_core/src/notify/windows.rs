use crate::error::AppError;
use crate::model::Notification;
use crate::notify::{Alerter, open_task_view, task_from_action, view_action};
use tauri_winrt_notification::Toast;

pub struct WindowsAlerter;

impl Alerter for WindowsAlerter {
    fn alert(&self, notification: &Notification) -> Result<(), AppError> {
        let task_id = notification.task_id.clone();
        let mut toast = Toast::new(Toast::POWERSHELL_APP_ID)
            .title("taskboard")
            .text1(&notification.title)
            .text2(&notification.message);

        if let Some(id) = task_id.as_deref() {
            toast = toast.add_button("View task", &view_action(id));
        }

        toast
            .on_activated(move |args| {
                let selected = args
                    .as_deref()
                    .and_then(task_from_action)
                    .map(str::to_string)
                    .or_else(|| task_id.clone());
                if let Some(id) = selected {
                    let _ = open_task_view(&id);
                }
                Ok(())
            })
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }
}
