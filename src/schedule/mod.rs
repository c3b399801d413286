//! Bounded LRU cache of parsed cron schedules (spec §4.2).

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cron::Schedule;
use moka::sync::Cache;

use crate::error::{AnalyzerError, Result};

const CAPACITY: u64 = 1000;

/// Keyed by cron expression string; not invalidated on config reload since
/// each entry is a pure function of its key.
#[derive(Clone)]
pub struct ScheduleCache {
    cache: Cache<String, Arc<Schedule>>,
}

impl ScheduleCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::new(CAPACITY),
        }
    }

    /// Parses (or retrieves from cache) the schedule and returns the next
    /// fire time strictly after `after`.
    pub fn next(&self, expression: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let schedule = self.schedule(expression)?;
        Ok(schedule.after(&after).next())
    }

    pub fn schedule(&self, expression: &str) -> Result<Arc<Schedule>> {
        if let Some(schedule) = self.cache.get(expression) {
            return Ok(schedule);
        }

        let normalized = normalize_to_seconds_first(expression);
        let schedule = Arc::new(Schedule::from_str(&normalized).map_err(|e| {
            AnalyzerError::InvalidSchedule(expression.to_string(), e.to_string())
        })?);
        self.cache.insert(expression.to_string(), schedule.clone());
        Ok(schedule)
    }
}

/// Kubernetes `CronJob.spec.schedule` is always standard 5-field cron
/// (minute hour dom month dow); the `cron` crate requires a seconds-first
/// 6–7 field expression. Prepend a `"0"` seconds field when given exactly
/// five fields; leave anything else (already seconds-first, or malformed)
/// untouched so parsing surfaces the real error.
fn normalize_to_seconds_first(expression: &str) -> String {
    if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

impl Default for ScheduleCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_parsed_schedule_across_calls() {
        let cache = ScheduleCache::new();
        let now = Utc::now();
        let first = cache.next("0 0 * * * *", now).unwrap();
        let second = cache.next("0 0 * * * *", now).unwrap();
        assert_eq!(first, second);
        cache.cache.run_pending_tasks();
        assert_eq!(cache.cache.entry_count(), 1);
    }

    #[test]
    fn invalid_expression_is_rejected() {
        let cache = ScheduleCache::new();
        let result = cache.next("not a schedule", Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn five_field_kubernetes_schedule_is_normalized_to_seconds_first() {
        let cache = ScheduleCache::new();
        let now = Utc::now();
        // Standard Kubernetes CronJob syntax: minute hour dom month dow.
        let five_field = cache.next("30 4 * * *", now).unwrap();
        let six_field = cache.next("0 30 4 * * *", now).unwrap();
        assert_eq!(five_field, six_field);
        assert!(five_field.is_some());
    }
}
