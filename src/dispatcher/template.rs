//! Alert template rendering (spec §4.4).

use minijinja::{context, Environment};
use serde::Serialize;

use crate::error::{DispatchError, Result};

use super::alert::Alert;

/// Default templates in case a channel omits its own.
pub const DEFAULT_SLACK_TEMPLATE: &str =
    "*[{{ severity }}] {{ title }}*\n{{ message }}\n\
     cron job: `{{ cron_job.namespace }}/{{ cron_job.name }}`\
     {% if context.reason %}\nreason: {{ context.reason }}{% endif %}\
     {% if context.suggested_fix %}\nsuggested fix: {{ context.suggested_fix }}{% endif %}\
     {% if context.logs %}\n```\n{{ context.logs }}\n```{% endif %}";

pub const DEFAULT_WEBHOOK_TEMPLATE: &str = "{{ title }}: {{ message }}";

pub const DEFAULT_EMAIL_SUBJECT_TEMPLATE: &str = "[{{ severity }}] {{ title }}";

pub const DEFAULT_PAGERDUTY_TEMPLATE: &str = "{{ title }}: {{ message }}";

/// Truncates logs to ~1500 characters and appends a marker, matching the
/// default templates' bound on included log context.
pub const LOG_TRUNCATION_LIMIT: usize = 1500;

pub fn truncate_logs(logs: &str) -> String {
    if logs.len() <= LOG_TRUNCATION_LIMIT {
        return logs.to_string();
    }
    let mut truncated = logs
        .char_indices()
        .take_while(|(idx, _)| *idx < LOG_TRUNCATION_LIMIT)
        .map(|(_, c)| c)
        .collect::<String>();
    truncated.push_str("\n...[truncated]");
    truncated
}

#[derive(Serialize)]
struct CronJobContext {
    namespace: String,
    name: String,
}

#[derive(Serialize)]
struct AlertContextView {
    exit_code: Option<i32>,
    reason: Option<String>,
    suggested_fix: Option<String>,
    logs: Option<String>,
    events: Option<String>,
}

pub fn render(template_source: &str, alert: &Alert) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("alert", template_source)
        .map_err(|e| DispatchError::Template(e.to_string()))?;
    let tmpl = env
        .get_template("alert")
        .map_err(|e| DispatchError::Template(e.to_string()))?;

    let rendered = tmpl
        .render(context! {
            title => alert.title,
            severity => alert.severity,
            alert_type => alert.alert_type,
            message => alert.message,
            cron_job => CronJobContext {
                namespace: alert.namespace.clone(),
                name: alert.cron_job_name.clone(),
            },
            context => AlertContextView {
                exit_code: alert.context.exit_code,
                reason: alert.context.reason.clone(),
                suggested_fix: alert.context.suggested_fix.clone(),
                logs: alert.context.logs.as_deref().map(truncate_logs),
                events: alert.context.events.clone(),
            },
            timestamp => alert.timestamp.to_rfc3339(),
        })
        .map_err(|e| DispatchError::Template(e.to_string()))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_alert() -> Alert {
        let mut alert = Alert::new(
            "default",
            "nightly-backup",
            "JobFailed",
            "critical",
            "nightly-backup failed",
            "exit code 1",
        );
        alert.context.reason = Some("OOMKilled".into());
        alert
    }

    #[test]
    fn renders_built_in_slack_template() {
        let rendered = render(DEFAULT_SLACK_TEMPLATE, &sample_alert()).unwrap();
        assert!(rendered.contains("nightly-backup failed"));
        assert!(rendered.contains("OOMKilled"));
        assert!(rendered.contains("default/nightly-backup"));
    }

    #[test]
    fn invalid_template_syntax_errors() {
        let result = render("{{ unterminated", &sample_alert());
        assert!(result.is_err());
    }

    #[test]
    fn truncate_logs_bounds_length_and_marks_truncation() {
        let logs = "x".repeat(5000);
        let truncated = truncate_logs(&logs);
        assert!(truncated.len() < logs.len());
        assert!(truncated.ends_with("...[truncated]"));
    }

    #[test]
    fn truncate_logs_leaves_short_logs_untouched() {
        assert_eq!(truncate_logs("short"), "short");
    }
}
