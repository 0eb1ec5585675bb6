//! time rules of the reminder: thresholds, working hours and the poll cadence
use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};

use crate::pagerduty::{Incident, IncidentStatus};

#[derive(Debug, Clone, Copy, Deserialize)]
/// how long an incident may stay open before a reminder is sent
pub struct ThresholdSettings {
	#[serde(default = "ThresholdSettings::default_triggered_minutes")]
	pub triggered_minutes: u32,
	#[serde(default = "ThresholdSettings::default_acknowledged_hours")]
	pub acknowledged_hours: u32,
}

impl ThresholdSettings {
	fn default_triggered_minutes() -> u32 {
		30
	}

	fn default_acknowledged_hours() -> u32 {
		2
	}

	pub fn triggered(&self) -> chrono::Duration {
		chrono::Duration::minutes(i64::from(self.triggered_minutes))
	}

	pub fn acknowledged(&self) -> chrono::Duration {
		chrono::Duration::hours(i64::from(self.acknowledged_hours))
	}
}

impl Default for ThresholdSettings {
	fn default() -> Self {
		Self {
			triggered_minutes: Self::default_triggered_minutes(),
			acknowledged_hours: Self::default_acknowledged_hours(),
		}
	}
}

#[derive(Debug, Clone, Copy, Deserialize)]
/// utc hours on mondays to fridays during which threaded follow-ups are posted
pub struct WorkingHours {
	/// first hour of the window (inclusive)
	pub start_hour: u32,
	/// end of the window (exclusive)
	pub end_hour: u32,
}

impl Default for WorkingHours {
	fn default() -> Self {
		Self { start_hour: 7, end_hour: 14 }
	}
}

#[serde_as]
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScheduleSettings {
	/// pause between two sweeps
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	#[serde(default = "ScheduleSettings::default_poll_interval")]
	pub poll_interval: Duration,
	/// utc hour at which the dedup mapping is cleared
	#[serde(default = "ScheduleSettings::default_reset_hour")]
	pub reset_hour: u32,
	#[serde(default)]
	pub working_hours: WorkingHours,
}

impl ScheduleSettings {
	fn default_poll_interval() -> Duration {
		Duration::from_secs(300)
	}

	fn default_reset_hour() -> u32 {
		7
	}
}

impl Default for ScheduleSettings {
	fn default() -> Self {
		Self {
			poll_interval: Self::default_poll_interval(),
			reset_hour: Self::default_reset_hour(),
			working_hours: WorkingHours::default(),
		}
	}
}

/// whether `now` is on a weekday within the working hours window
pub fn is_within_working_hours(now: DateTime<Utc>, window: &WorkingHours) -> bool {
	if now.weekday().number_from_monday() > 5 {
		return false;
	}

	(window.start_hour..window.end_hour).contains(&now.hour())
}

/// Returns the time the incident has been open if it is overdue for a
/// reminder. Only triggered and acknowledged incidents can be overdue.
pub fn evaluate_threshold(
	incident: &Incident,
	now: DateTime<Utc>,
	thresholds: &ThresholdSettings,
) -> Option<chrono::Duration> {
	let elapsed = now - incident.created_at;

	let threshold = match incident.status {
		IncidentStatus::Triggered => thresholds.triggered(),
		IncidentStatus::Acknowledged => thresholds.acknowledged(),
		_ => return None,
	};

	(elapsed > threshold).then(|| elapsed)
}

/// `H:MM:SS`, prefixed with the number of days once it exceeds a day.
/// Sub-second parts are dropped.
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
	let total = elapsed.num_seconds().max(0);
	let (days, rest) = (total / 86_400, total % 86_400);
	let hms = format!("{}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);

	match days {
		0 => hms,
		1 => format!("1 day, {hms}"),
		_ => format!("{days} days, {hms}"),
	}
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;
	use serde_json::json;

	use super::*;

	fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
	}

	fn incident(status: &str, created_at: DateTime<Utc>) -> Incident {
		serde_json::from_value(json!({
			"id": "INC-1",
			"status": status,
			"urgency": "high",
			"created_at": created_at,
			"service": { "id": "S1", "summary": "billing" },
		}))
		.unwrap()
	}

	#[test]
	fn working_hours() {
		let window = WorkingHours::default();

		// 2024-06-15 is a saturday, 2024-06-12 a wednesday
		assert!(!is_within_working_hours(at(2024, 6, 15, 10, 0), &window));
		assert!(is_within_working_hours(at(2024, 6, 12, 9, 0), &window));
		assert!(!is_within_working_hours(at(2024, 6, 12, 15, 0), &window));
		assert!(is_within_working_hours(at(2024, 6, 12, 7, 0), &window));
		assert!(!is_within_working_hours(at(2024, 6, 12, 14, 0), &window));
		assert!(!is_within_working_hours(at(2024, 6, 16, 9, 0), &window));
	}

	#[test]
	fn triggered_threshold_is_exclusive() {
		let now = at(2024, 6, 12, 10, 0);
		let thresholds = ThresholdSettings::default();

		assert_eq!(
			evaluate_threshold(&incident("triggered", at(2024, 6, 12, 9, 20)), now, &thresholds),
			Some(chrono::Duration::minutes(40))
		);
		assert_eq!(
			evaluate_threshold(&incident("triggered", at(2024, 6, 12, 9, 30)), now, &thresholds),
			None
		);
	}

	#[test]
	fn acknowledged_threshold() {
		let now = at(2024, 6, 12, 10, 0);
		let thresholds = ThresholdSettings::default();

		assert_eq!(
			evaluate_threshold(&incident("acknowledged", at(2024, 6, 12, 8, 30)), now, &thresholds),
			None
		);
		assert!(evaluate_threshold(&incident("acknowledged", at(2024, 6, 12, 7, 59)), now, &thresholds)
			.is_some());
	}

	#[test]
	fn other_statuses_are_never_due() {
		let now = at(2024, 6, 12, 10, 0);

		assert_eq!(
			evaluate_threshold(
				&incident("resolved", at(2024, 6, 1, 0, 0)),
				now,
				&ThresholdSettings::default()
			),
			None
		);
	}

	#[test]
	fn elapsed_is_truncated_to_seconds() {
		assert_eq!(format_elapsed(chrono::Duration::milliseconds(2_400_999)), "0:40:00");
		assert_eq!(format_elapsed(chrono::Duration::seconds(3 * 3600 + 5)), "3:00:05");
		assert_eq!(format_elapsed(chrono::Duration::seconds(86_400 + 61)), "1 day, 0:01:01");
		assert_eq!(format_elapsed(chrono::Duration::days(3)), "3 days, 0:00:00");
	}
}
