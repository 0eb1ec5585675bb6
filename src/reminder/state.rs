//! dedup state of the reminder loop
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use hashbrown::HashMap;

#[derive(Debug, Default, Clone)]
/// Incidents we already handled since the last reset. Owned by the loop and
/// lost on restart.
pub struct ReminderState {
	/// incident id -> point in time it was recorded
	processed: HashMap<String, DateTime<Utc>>,
	/// utc date of the last reset
	last_reset: Option<NaiveDate>,
}

impl ReminderState {
	pub fn is_processed(&self, incident_id: &str) -> bool {
		self.processed.contains_key(incident_id)
	}

	/// record an incident, it won't be reminded about again until the next reset
	pub fn mark_processed(&mut self, incident_id: &str, now: DateTime<Utc>) {
		self.processed.insert(incident_id.to_owned(), now);
	}

	#[cfg(test)]
	pub fn processed_at(&self, incident_id: &str) -> Option<DateTime<Utc>> {
		self.processed.get(incident_id).copied()
	}

	pub fn len(&self) -> usize {
		self.processed.len()
	}

	#[cfg(test)]
	pub fn last_reset(&self) -> Option<NaiveDate> {
		self.last_reset
	}

	/// Clears the mapping if `now` is within `reset_hour` and we haven't reset
	/// on this date yet. Returns whether a reset happened.
	pub fn reset_if_due(&mut self, now: DateTime<Utc>, reset_hour: u32) -> bool {
		let today = now.date_naive();

		if now.hour() != reset_hour || self.last_reset == Some(today) {
			return false;
		}

		self.processed.clear();
		self.last_reset = Some(today);
		true
	}
}
