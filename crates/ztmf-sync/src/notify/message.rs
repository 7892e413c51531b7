//! Rendering of sync outcomes into chat messages.

use crate::sync::SyncResult;
use chrono::{DateTime, Datelike, Utc};
use std::time::Duration;

const MAX_ERROR_CHARS: usize = 100;

/// Everything a sync message needs, independent of the sync path.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub environment: String,
    /// e.g. `cfacts-s3/s3`, `tables/scheduled`
    pub trigger: String,
    pub destination: String,
    pub dry_run: bool,
    pub succeeded: usize,
    pub failed_tables: Vec<String>,
    pub errors: Vec<String>,
    pub total_rows: u64,
    pub duration: Duration,
}

impl Notification {
    pub fn from_result(result: &SyncResult, environment: &str, trigger: &str, destination: &str) -> Self {
        let failed: Vec<_> = result.tables().iter().filter(|t| t.error.is_some()).collect();
        Self {
            environment: environment.to_string(),
            trigger: trigger.to_string(),
            destination: destination.to_string(),
            dry_run: result.dry_run(),
            succeeded: result.tables().len() - failed.len(),
            failed_tables: failed.iter().map(|t| t.destination.clone()).collect(),
            errors: failed.iter().filter_map(|t| t.error.clone()).collect(),
            total_rows: result.total_rows(),
            duration: result.duration(),
        }
    }

    /// Failure notice for a sync that aborted before producing a result.
    pub fn aborted(
        environment: &str,
        trigger: &str,
        destination: &str,
        table: &str,
        error: &str,
        dry_run: bool,
        duration: Duration,
    ) -> Self {
        Self {
            environment: environment.to_string(),
            trigger: trigger.to_string(),
            destination: destination.to_string(),
            dry_run,
            succeeded: 0,
            failed_tables: vec![table.to_string()],
            errors: vec![error.to_string()],
            total_rows: 0,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed_tables.is_empty()
    }

    pub fn render(&self, now: DateTime<Utc>) -> String {
        let env = self.environment.to_uppercase();
        let cadence = schedule_type(&self.environment);
        let mode = if self.dry_run { " DRY RUN" } else { "" };

        if self.is_success() {
            format!(
                "✅ ZTMF Data Sync{mode} SUCCESS ({env} - {cadence})\n\
                 🔁 Trigger: {}\n\
                 📊 {} tables synced: {} rows\n\
                 ⏱️ Duration: {}\n\
                 📅 {} data now available in {}",
                self.trigger,
                self.succeeded,
                format_number(self.total_rows),
                format_duration(self.duration),
                quarter_label(now),
                self.destination,
            )
        } else {
            format!(
                "🚨 ZTMF Data Sync{mode} FAILURE ({env} - {cadence})\n\
                 🔁 Trigger: {}\n\
                 ❌ {} table(s) failed: {}\n\
                 ✅ {} tables successful: {} rows\n\
                 🔧 Action Required: {}",
                self.trigger,
                self.failed_tables.len(),
                self.failed_tables.join(", "),
                self.succeeded,
                format_number(self.total_rows),
                self.errors.first().map(|e| truncate_error(e)).unwrap_or_default(),
            )
        }
    }
}

pub fn schedule_type(environment: &str) -> &'static str {
    if environment.eq_ignore_ascii_case("prod") {
        "Quarterly"
    } else {
        "Weekly"
    }
}

/// `Q<n> <year>` for `now`.
pub fn quarter_label(now: DateTime<Utc>) -> String {
    format!("Q{} {}", (now.month() - 1) / 3 + 1, now.year())
}

/// Thousands-separated integer, e.g. `1,234,567`.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

fn truncate_error(error: &str) -> String {
    if error.chars().count() > MAX_ERROR_CHARS {
        let head: String = error.chars().take(MAX_ERROR_CHARS).collect();
        format!("{head}...")
    } else {
        error.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Notification {
        Notification {
            environment: "dev".into(),
            trigger: "tables/scheduled".into(),
            destination: "the warehouse".into(),
            dry_run: false,
            succeeded: 12,
            failed_tables: vec![],
            errors: vec![],
            total_rows: 1_234_567,
            duration: Duration::from_secs(95),
        }
    }

    #[test]
    fn numbers_and_durations() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
        assert_eq!(format_duration(Duration::from_millis(4_240)), "4.2s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
        assert_eq!(format_duration(Duration::from_secs(5400)), "1.5h");
    }

    #[test]
    fn quarters() {
        let at = |m| Utc.with_ymd_and_hms(2025, m, 15, 0, 0, 0).unwrap();
        assert_eq!(quarter_label(at(1)), "Q1 2025");
        assert_eq!(quarter_label(at(6)), "Q2 2025");
        assert_eq!(quarter_label(at(9)), "Q3 2025");
        assert_eq!(quarter_label(at(12)), "Q4 2025");
    }

    #[test]
    fn success_message() {
        let now = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
        let text = sample().render(now);
        assert!(text.starts_with("✅ ZTMF Data Sync SUCCESS (DEV - Weekly)"));
        assert!(text.contains("Trigger: tables/scheduled"));
        assert!(text.contains("12 tables synced: 1,234,567 rows"));
        assert!(text.contains("Duration: 1.6m"));
        assert!(text.contains("Q3 2025 data now available in the warehouse"));
    }

    #[test]
    fn failure_message_truncates_first_error() {
        let mut n = sample();
        n.environment = "prod".into();
        n.succeeded = 10;
        n.total_rows = 500;
        n.failed_tables = vec!["ZTMF_SCORES".into(), "ZTMF_USERS".into()];
        n.errors = vec!["x".repeat(150), "second".into()];

        let text = n.render(Utc::now());
        assert!(text.starts_with("🚨 ZTMF Data Sync FAILURE (PROD - Quarterly)"));
        assert!(text.contains("2 table(s) failed: ZTMF_SCORES, ZTMF_USERS"));
        assert!(text.contains("10 tables successful: 500 rows"));
        assert!(text.ends_with(&format!("Action Required: {}...", "x".repeat(100))));
    }

    #[test]
    fn dry_runs_are_labelled() {
        let mut n = sample();
        n.dry_run = true;
        assert!(n.render(Utc::now()).starts_with("✅ ZTMF Data Sync DRY RUN SUCCESS"));
    }
}
