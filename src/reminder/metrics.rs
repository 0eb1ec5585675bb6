//! prometheus meters for the reminder loop

use once_cell::sync::OnceCell;
use prometheus::{IntCounter, IntCounterVec, IntGauge};

static METRICS: OnceCell<ReminderMetrics> = OnceCell::new();

pub(crate) struct ReminderMetrics {
	/// total number of sweeps
	pub(crate) sweeps: IntCounter,
	/// sweeps where the incident list couldn't be fetched
	pub(crate) fetch_failures: IntCounter,
	/// incidents per sweep outcome
	pub(crate) incidents: IntCounterVec,
	/// posted reminders by status, and failed posts
	pub(crate) reminders: IntCounterVec,
	/// threaded follow-ups by outcome
	pub(crate) thread_replies: IntCounterVec,
	/// number of dedup resets
	pub(crate) resets: IntCounter,
	/// size of the dedup mapping after the last sweep
	pub(crate) processed: IntGauge,
}

impl ReminderMetrics {
	/// get or register the process wide meters
	pub(crate) fn global() -> Result<&'static Self, prometheus::Error> {
		METRICS.get_or_try_init(Self::new)
	}

	fn new() -> Result<Self, prometheus::Error> {
		use prometheus::{opts, register_int_counter, register_int_counter_vec, register_int_gauge};

		let sweeps = register_int_counter!(opts!("sweeps_total", "total number of sweeps")
			.namespace("pd_reminder")
			.subsystem("reminder"))?;

		let fetch_failures = register_int_counter!(opts!(
			"fetch_failures_total",
			"sweeps where incidents couldn't be fetched"
		)
		.namespace("pd_reminder")
		.subsystem("reminder"))?;

		let incidents = register_int_counter_vec!(
			opts!("incidents_total", "fetched incidents by sweep outcome")
				.namespace("pd_reminder")
				.subsystem("reminder"),
			&["outcome"]
		)?;

		let reminders = register_int_counter_vec!(
			opts!("reminders_total", "reminder messages posted to the channel")
				.namespace("pd_reminder")
				.subsystem("reminder"),
			&["status", "result"]
		)?;

		let thread_replies = register_int_counter_vec!(
			opts!("thread_replies_total", "threaded follow-up messages")
				.namespace("pd_reminder")
				.subsystem("reminder"),
			&["outcome"]
		)?;

		let resets = register_int_counter!(opts!("resets_total", "dedup mapping resets")
			.namespace("pd_reminder")
			.subsystem("reminder"))?;

		let processed = register_int_gauge!(opts!(
			"processed_incidents",
			"incidents in the dedup mapping"
		)
		.namespace("pd_reminder")
		.subsystem("reminder"))?;

		Ok(Self { sweeps, fetch_failures, incidents, reminders, thread_replies, resets, processed })
	}
}
