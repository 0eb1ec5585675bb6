//! The reminder loop.
//!
//! Every poll interval the loop clears the dedup mapping if the daily reset is
//! due and then sweeps the open high urgency incidents: overdue incidents get
//! a reminder in the slack channel mentioning the level 1 on-call responders,
//! followed by a snooze hint in the thread during working hours.
//!
//! No call is retried. A failed call degrades to "no data" for the current
//! sweep and the next poll, one interval later, is the retry.

use std::{future::Future, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

pub use self::{
	schedule::{ScheduleSettings, ThresholdSettings},
	state::ReminderState,
};
use self::{
	metrics::ReminderMetrics,
	schedule::{evaluate_threshold, format_elapsed, is_within_working_hours},
};
use crate::{
	exclusion_list::ExclusionList,
	pagerduty::{Incident, IncidentSource, IncidentStatus, Urgency},
	renderer::{MessageRenderer, ReminderContext},
	settings::Settings,
	slack::ChatNotifier,
};

mod metrics;
mod schedule;
mod state;

/// maximum number of incidents fetched per sweep
const INCIDENT_LIMIT: usize = 100;
/// mention text used if nobody is on call
const NOBODY: &str = "nobody";
/// email used if pagerduty doesn't tell us the user's email
const UNKNOWN_EMAIL: &str = "unknown email";
/// name used for on-call users without a summary
const UNKNOWN_NAME: &str = "unknown";

#[derive(Debug, Clone)]
/// the parts of the settings the loop works with
pub struct ReminderConfig {
	/// slack channel reminders are posted to
	pub channel: String,
	pub excluded_services: ExclusionList,
	pub thresholds: ThresholdSettings,
	pub schedule: ScheduleSettings,
}

impl From<&Settings> for ReminderConfig {
	fn from(settings: &Settings) -> Self {
		Self {
			channel: settings.slack.channel.clone(),
			excluded_services: settings.excluded_services.clone(),
			thresholds: settings.incident_thresholds,
			schedule: settings.schedule,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// a level 1 responder of a service, resolved anew for every reminder
pub struct OnCallUser {
	pub name: String,
	pub email: String,
	/// slack mention, or the raw email if slack doesn't know the user
	pub mention: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// what a sweep did with an incident
enum Outcome {
	/// service is excluded or urgency isn't high
	Excluded,
	/// already in the dedup mapping
	AlreadyProcessed,
	/// has pending actions, recorded without reminder
	PendingActions,
	/// not open long enough yet
	NotDue,
	/// reminder message couldn't be rendered
	RenderFailed,
	/// reminder was posted (or posting was attempted)
	Notified,
}

impl Outcome {
	fn as_str(&self) -> &'static str {
		match self {
			Self::Excluded => "excluded",
			Self::AlreadyProcessed => "already_processed",
			Self::PendingActions => "pending_actions",
			Self::NotDue => "not_due",
			Self::RenderFailed => "render_failed",
			Self::Notified => "notified",
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// summary of a single sweep
pub struct SweepReport {
	pub fetched: usize,
	pub notified: usize,
	pub skipped_excluded: usize,
	pub skipped_processed: usize,
	pub suppressed_pending: usize,
	pub not_due: usize,
	pub render_failed: usize,
}

impl SweepReport {
	fn record(&mut self, outcome: Outcome) {
		let counter = match outcome {
			Outcome::Excluded => &mut self.skipped_excluded,
			Outcome::AlreadyProcessed => &mut self.skipped_processed,
			Outcome::PendingActions => &mut self.suppressed_pending,
			Outcome::NotDue => &mut self.not_due,
			Outcome::RenderFailed => &mut self.render_failed,
			Outcome::Notified => &mut self.notified,
		};
		*counter += 1;
	}
}

/// Polls the incident source and posts reminders through the chat notifier.
pub struct Reminder<S, C> {
	source: S,
	chat: C,
	renderer: MessageRenderer,
	config: ReminderConfig,
	metrics: &'static ReminderMetrics,
}

impl<S: IncidentSource, C: ChatNotifier> Reminder<S, C> {
	pub fn new(source: S, chat: C, renderer: MessageRenderer, config: ReminderConfig) -> Result<Self> {
		Ok(Self {
			source,
			chat,
			renderer,
			config,
			metrics: ReminderMetrics::global().context("failed to register prometheus meters")?,
		})
	}

	/// Sweep every poll interval until `shutdown` resolves.
	pub async fn run(&self, state: &mut ReminderState, shutdown: impl Future<Output = ()>) {
		tokio::pin!(shutdown);

		loop {
			self.poll(state, Utc::now()).await;

			tokio::select! {
				_ = &mut shutdown => {
					tracing::info!("stopping reminder loop");
					return;
				}
				_ = tokio::time::sleep(self.poll_interval()) => {}
			}
		}
	}

	pub fn poll_interval(&self) -> Duration {
		self.config.schedule.poll_interval
	}

	/// reset check followed by one sweep
	pub async fn poll(&self, state: &mut ReminderState, now: DateTime<Utc>) -> SweepReport {
		if state.reset_if_due(now, self.config.schedule.reset_hour) {
			self.metrics.resets.inc();
			tracing::info!(
				"cleared processed incidents at {:02}:00 UTC",
				self.config.schedule.reset_hour
			);
		}

		let report = self.sweep(state, now).await;
		tracing::info!(
			fetched = report.fetched,
			notified = report.notified,
			excluded = report.skipped_excluded,
			already_processed = report.skipped_processed,
			pending = report.suppressed_pending,
			not_due = report.not_due,
			render_failed = report.render_failed,
			"sweep finished"
		);

		report
	}

	/// Check all open high urgency incidents once and remind about the overdue
	/// ones. Never fails, errors are logged and skipped.
	pub async fn sweep(&self, state: &mut ReminderState, now: DateTime<Utc>) -> SweepReport {
		self.metrics.sweeps.inc();

		let incidents = match self
			.source
			.list_incidents(
				Urgency::High,
				&[IncidentStatus::Triggered, IncidentStatus::Acknowledged],
				INCIDENT_LIMIT,
			)
			.await
		{
			Ok(incidents) => incidents,
			Err(err) => {
				self.metrics.fetch_failures.inc();
				tracing::error!("failed to fetch incidents: {}", err);
				Vec::new()
			}
		};

		let mut report = SweepReport { fetched: incidents.len(), ..SweepReport::default() };

		for incident in incidents.iter() {
			let outcome = self.process_incident(state, incident, now).await;
			self.metrics.incidents.with_label_values(&[outcome.as_str()]).inc();
			report.record(outcome);
		}

		self.metrics.processed.set(state.len() as i64);

		report
	}

	async fn process_incident(
		&self,
		state: &mut ReminderState,
		incident: &Incident,
		now: DateTime<Utc>,
	) -> Outcome {
		if self.config.excluded_services.contains(&incident.service.summary)
			|| incident.urgency != Urgency::High
		{
			return Outcome::Excluded;
		}

		if state.is_processed(&incident.id) {
			return Outcome::AlreadyProcessed;
		}

		if incident.has_pending_actions() {
			state.mark_processed(&incident.id, now);
			let actions: Vec<String> = incident
				.pending_actions
				.iter()
				.map(|action| match action.at {
					Some(at) => format!("{} at {}", action.kind, at.to_rfc3339()),
					None => action.kind.clone(),
				})
				.collect();
			tracing::info!(
				incident_id = incident.id.as_str(),
				"incident has pending actions ({}), no reminders until the next reset",
				actions.join(", ")
			);
			return Outcome::PendingActions;
		}

		let elapsed = match evaluate_threshold(incident, now, &self.config.thresholds) {
			Some(elapsed) => elapsed,
			None => return Outcome::NotDue,
		};

		let on_call = self.resolve_on_call(&incident.service.id).await;
		for user in on_call.iter() {
			tracing::debug!(
				incident_id = incident.id.as_str(),
				"on call: {} <{}>",
				user.name,
				user.email
			);
		}
		let mentions = mention_list(&on_call);
		let elapsed = format_elapsed(elapsed);
		let context = ReminderContext::new(incident, &mentions, &elapsed);

		let primary = match self.renderer.render_primary(&context) {
			Ok(primary) => primary,
			Err(err) => {
				tracing::error!(
					incident_id = incident.id.as_str(),
					"failed to render reminder: {:?}",
					err
				);
				return Outcome::RenderFailed;
			}
		};

		self.notify(incident, &primary, &context, now).await;

		// recorded even if posting failed, the next reminder comes after the reset
		state.mark_processed(&incident.id, now);

		Outcome::Notified
	}

	/// Post the reminder and, during working hours, the follow-up in its thread.
	/// The follow-up is only rendered once it is going to be sent, a broken
	/// thread template costs the follow-up and nothing else.
	async fn notify(
		&self,
		incident: &Incident,
		primary: &str,
		context: &ReminderContext<'_>,
		now: DateTime<Utc>,
	) {
		let status = incident.status.as_str();

		let handle = match self.chat.post_message(&self.config.channel, primary).await {
			Ok(handle) => {
				self.metrics.reminders.with_label_values(&[status, "sent"]).inc();
				tracing::info!(
					incident_id = incident.id.as_str(),
					service = incident.service.summary.as_str(),
					"posted reminder"
				);
				handle
			}
			Err(err) => {
				self.metrics.reminders.with_label_values(&[status, "failed"]).inc();
				tracing::error!(
					incident_id = incident.id.as_str(),
					"failed to post reminder: {}",
					err
				);
				return;
			}
		};

		let handle = match handle {
			Some(handle) => handle,
			None => return,
		};

		if !is_within_working_hours(now, &self.config.schedule.working_hours) {
			self.metrics.thread_replies.with_label_values(&["suppressed"]).inc();
			tracing::info!(
				incident_id = incident.id.as_str(),
				"outside working hours, not posting follow-up"
			);
			return;
		}

		let thread = match self.renderer.render_thread(context) {
			Ok(thread) => thread,
			Err(err) => {
				self.metrics.thread_replies.with_label_values(&["render_failed"]).inc();
				tracing::error!(
					incident_id = incident.id.as_str(),
					"failed to render follow-up: {:?}",
					err
				);
				return;
			}
		};

		match self.chat.post_thread_reply(&handle, &thread).await {
			Ok(()) => self.metrics.thread_replies.with_label_values(&["sent"]).inc(),
			Err(err) => {
				self.metrics.thread_replies.with_label_values(&["failed"]).inc();
				tracing::error!(
					incident_id = incident.id.as_str(),
					"failed to post follow-up: {}",
					err
				);
			}
		}
	}

	/// Level 1 on-call users of a service. Any failure before the users are
	/// known yields an empty list; per user failures fall back to the email.
	pub async fn resolve_on_call(&self, service_id: &str) -> Vec<OnCallUser> {
		let policy = match self.source.get_service(service_id).await {
			Ok(service) => match service.escalation_policy {
				Some(policy) => policy,
				None => return Vec::new(),
			},
			Err(err) => {
				tracing::error!("failed to get on-call users for service {}: {}", service_id, err);
				return Vec::new();
			}
		};

		let oncalls = match self.source.list_oncalls(&policy.id).await {
			Ok(oncalls) => oncalls,
			Err(err) => {
				tracing::error!("failed to get on-call users for service {}: {}", service_id, err);
				return Vec::new();
			}
		};

		let level_one = oncalls
			.into_iter()
			.filter(|oncall| oncall.escalation_level == 1)
			.filter_map(|oncall| oncall.user);

		let mut users = Vec::new();
		for user in level_one {
			let email = match self.source.get_user(&user.id).await {
				Ok(found) => found.email.unwrap_or_else(|| UNKNOWN_EMAIL.to_owned()),
				Err(err) => {
					tracing::error!("failed to get pagerduty user {}: {}", user.id, err);
					UNKNOWN_EMAIL.to_owned()
				}
			};

			let mention = match self.chat.lookup_user_by_email(&email).await {
				Ok(mention) => mention,
				Err(err) => {
					tracing::warn!("no slack user for {}: {}", email, err);
					email.clone()
				}
			};

			users.push(OnCallUser {
				name: user.summary.unwrap_or_else(|| UNKNOWN_NAME.to_owned()),
				email,
				mention,
			});
		}

		users
	}
}

/// comma separated mentions, or [NOBODY]
fn mention_list(users: &[OnCallUser]) -> String {
	if users.is_empty() {
		return NOBODY.to_owned();
	}

	users.iter().map(|user| user.mention.as_str()).collect::<Vec<_>>().join(", ")
}
