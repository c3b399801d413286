//! Suggested-fix resolution (spec §4.7): maps a failed job's termination
//! reason, exit code, and captured logs/events onto human-readable
//! remediation guidance.

use regex::Regex;

use crate::crd::monitor::{SuggestedFixMatcher, SuggestedFixPattern};

/// A user-supplied override, checked before the built-in rule table and
/// event-substring fallback. Higher `priority` matches first; ties keep
/// declaration order.
#[derive(Debug, Clone)]
pub struct CustomPattern {
    pub priority: i32,
    pub matcher: PatternMatcher,
    pub template: String,
}

#[derive(Debug, Clone)]
pub enum PatternMatcher {
    ExitCode(i32),
    ExitCodeRange(i32, i32),
    Reason(String),
    Regex(Regex),
}

/// Everything known about a failed job that a pattern can match against or
/// a template can reference.
#[derive(Debug, Clone, Default)]
pub struct FailureContext<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
    pub job_name: &'a str,
    pub exit_code: Option<i32>,
    pub reason: Option<&'a str>,
    pub logs: Option<&'a str>,
    pub events: Option<&'a str>,
}

/// (reason substring, guidance) pairs, checked both as an exact reason
/// match and as an events-text substring scan.
const BUILTIN_RULES: &[(&str, &str)] = &[
    ("OOMKilled", "Job was OOM-killed. Consider raising the container's memory limit."),
    ("ImagePullBackOff", "Image could not be pulled. Check the image reference and imagePullSecrets."),
    ("ErrImagePull", "Image could not be pulled. Check the image reference and imagePullSecrets."),
    ("DeadlineExceeded", "Job exceeded its activeDeadlineSeconds. Consider raising the deadline or investigating slow startup."),
    ("CrashLoopBackOff", "Container is crash-looping. Check recent logs for a startup error."),
    ("Evicted", "Pod was evicted, likely due to node resource pressure."),
    ("InvalidImageName", "The configured image reference is malformed."),
    ("Error", "Container exited with a non-zero status. Inspect logs for the failing command."),
];

fn render_template(template: &str, ctx: &FailureContext) -> String {
    template
        .replace("{{.Namespace}}", ctx.namespace)
        .replace("{{.Name}}", ctx.name)
        .replace("{{.JobName}}", ctx.job_name)
        .replace(
            "{{.ExitCode}}",
            &ctx.exit_code.map(|c| c.to_string()).unwrap_or_default(),
        )
        .replace("{{.Reason}}", ctx.reason.unwrap_or(""))
}

fn matches(matcher: &PatternMatcher, ctx: &FailureContext) -> bool {
    match matcher {
        PatternMatcher::ExitCode(code) => ctx.exit_code == Some(*code),
        PatternMatcher::ExitCodeRange(lo, hi) => {
            ctx.exit_code.is_some_and(|c| c >= *lo && c <= *hi)
        }
        PatternMatcher::Reason(reason) => ctx.reason == Some(reason.as_str()),
        PatternMatcher::Regex(re) => {
            let haystacks = [ctx.reason, ctx.logs, ctx.events];
            haystacks.into_iter().flatten().any(|h| re.is_match(h))
        }
    }
}

/// Resolves suggested-fix guidance for a failed job, checking custom
/// patterns (by descending priority) first, then the built-in rule table
/// against the exact reason, then an events-substring scan of the same
/// table. `None` if nothing matches.
pub fn resolve(ctx: &FailureContext, custom_patterns: &[CustomPattern]) -> Option<String> {
    let mut ordered: Vec<&CustomPattern> = custom_patterns.iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    for pattern in ordered {
        if matches(&pattern.matcher, ctx) {
            return Some(render_template(&pattern.template, ctx));
        }
    }

    if let Some(reason) = ctx.reason {
        if let Some((_, guidance)) = BUILTIN_RULES.iter().find(|(key, _)| *key == reason) {
            return Some(guidance.to_string());
        }
    }

    if let Some(events) = ctx.events {
        if let Some((_, guidance)) = BUILTIN_RULES.iter().find(|(key, _)| events.contains(key)) {
            return Some(guidance.to_string());
        }
    }

    None
}

/// Compiles monitor-supplied pattern specs into matchers, skipping (and
/// logging) any with an invalid regex rather than failing the whole batch.
pub fn compile_patterns(specs: &[SuggestedFixPattern]) -> Vec<CustomPattern> {
    specs
        .iter()
        .filter_map(|spec| {
            let matcher = match &spec.matcher {
                SuggestedFixMatcher::ExitCode { exit_code } => PatternMatcher::ExitCode(*exit_code),
                SuggestedFixMatcher::ExitCodeRange { min_exit_code, max_exit_code } => {
                    PatternMatcher::ExitCodeRange(*min_exit_code, *max_exit_code)
                }
                SuggestedFixMatcher::Reason { reason } => PatternMatcher::Reason(reason.clone()),
                SuggestedFixMatcher::Regex { pattern } => match Regex::new(pattern) {
                    Ok(re) => PatternMatcher::Regex(re),
                    Err(error) => {
                        tracing::warn!(%error, pattern, "invalid suggested-fix regex pattern, skipping");
                        return None;
                    }
                },
            };
            Some(CustomPattern { priority: spec.priority, matcher, template: spec.template.clone() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(reason: Option<&'a str>, exit_code: Option<i32>, events: Option<&'a str>) -> FailureContext<'a> {
        FailureContext {
            namespace: "default",
            name: "nightly-backup",
            job_name: "nightly-backup-29384710",
            exit_code,
            reason,
            logs: None,
            events,
        }
    }

    #[test]
    fn builtin_rule_matches_exact_reason() {
        let guidance = resolve(&ctx(Some("OOMKilled"), Some(137), None), &[]).unwrap();
        assert!(guidance.contains("memory"));
    }

    #[test]
    fn falls_back_to_event_substring_scan() {
        let events = "0/3 nodes are available: insufficient memory. pod triggered ImagePullBackOff for container";
        let guidance = resolve(&ctx(None, None, Some(events)), &[]).unwrap();
        assert!(guidance.contains("Image"));
    }

    #[test]
    fn no_match_returns_none() {
        assert!(resolve(&ctx(Some("Unknown"), Some(1), None), &[]).is_none());
    }

    #[test]
    fn custom_pattern_outranks_builtin_by_priority() {
        let patterns = vec![CustomPattern {
            priority: 100,
            matcher: PatternMatcher::ExitCode(137),
            template: "custom guidance for {{.JobName}} (exit {{.ExitCode}})".into(),
        }];
        let guidance = resolve(&ctx(Some("OOMKilled"), Some(137), None), &patterns).unwrap();
        assert_eq!(guidance, "custom guidance for nightly-backup-29384710 (exit 137)");
    }

    #[test]
    fn exit_code_range_pattern_matches_inclusive_bounds() {
        let patterns = vec![CustomPattern {
            priority: 0,
            matcher: PatternMatcher::ExitCodeRange(100, 110),
            template: "range match".into(),
        }];
        assert!(resolve(&ctx(None, Some(105), None), &patterns).is_some());
        assert!(resolve(&ctx(None, Some(111), None), &patterns).is_none());
    }

    #[test]
    fn compile_patterns_skips_invalid_regex_but_keeps_the_rest() {
        let specs = vec![
            SuggestedFixPattern {
                priority: 5,
                matcher: SuggestedFixMatcher::Regex { pattern: "(unclosed".into() },
                template: "unreachable".into(),
            },
            SuggestedFixPattern {
                priority: 1,
                matcher: SuggestedFixMatcher::ExitCode { exit_code: 137 },
                template: "custom oom guidance".into(),
            },
        ];
        let compiled = compile_patterns(&specs);
        assert_eq!(compiled.len(), 1);
        let guidance = resolve(&ctx(Some("OOMKilled"), Some(137), None), &compiled).unwrap();
        assert_eq!(guidance, "custom oom guidance");
    }

    #[test]
    fn regex_pattern_scans_reason_logs_and_events() {
        let patterns = vec![CustomPattern {
            priority: 0,
            matcher: PatternMatcher::Regex(Regex::new(r"(?i)disk\s+full").unwrap()),
            template: "free up disk space".into(),
        }];
        let mut c = ctx(None, None, None);
        c.logs = Some("write failed: disk full on /data");
        assert_eq!(resolve(&c, &patterns).unwrap(), "free up disk space");
    }
}
