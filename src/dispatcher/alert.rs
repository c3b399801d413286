//! The payload that flows from reconcilers into the dispatcher (spec §4.4).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AlertKey;

#[derive(Debug, Clone, Serialize)]
pub struct AlertContext {
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
    pub suggested_fix: Option<String>,
    pub logs: Option<String>,
    pub events: Option<String>,
}

impl Default for AlertContext {
    fn default() -> Self {
        Self {
            exit_code: None,
            reason: None,
            suggested_fix: None,
            logs: None,
            events: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub key: AlertKey,
    pub namespace: String,
    pub cron_job_name: String,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    pub context: AlertContext,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        namespace: impl Into<String>,
        cron_job_name: impl Into<String>,
        alert_type: impl Into<String>,
        severity: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into();
        let cron_job_name = cron_job_name.into();
        let alert_type = alert_type.into();
        let key = crate::alert_key(&namespace, &cron_job_name, &alert_type);
        Self {
            key,
            namespace,
            cron_job_name,
            alert_type,
            severity: severity.into(),
            title: title.into(),
            message: message.into(),
            context: AlertContext::default(),
            timestamp: Utc::now(),
        }
    }
}
