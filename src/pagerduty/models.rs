//! typed records of the pagerduty rest api v2. Only the fields we look at are
//! modelled, absent optional fields fall back to defaults.
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_with::{serde_as, DefaultOnNull};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
/// incident status
pub enum IncidentStatus {
	Triggered,
	Acknowledged,
	Resolved,
	#[serde(other)]
	Other,
}

impl IncidentStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Triggered => "triggered",
			Self::Acknowledged => "acknowledged",
			Self::Resolved => "resolved",
			Self::Other => "other",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
/// incident urgency
pub enum Urgency {
	High,
	Low,
	#[serde(other)]
	Other,
}

impl Urgency {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::High => "high",
			Self::Low => "low",
			Self::Other => "other",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// reference to the service an incident belongs to
pub struct ServiceReference {
	pub id: String,
	/// display name of the service
	#[serde(default)]
	pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// an action pagerduty will perform on the incident, e.g. unacknowledge after
/// a snooze
pub struct PendingAction {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub at: Option<DateTime<Utc>>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// snapshot of an incident as returned by `GET /incidents`
pub struct Incident {
	pub id: String,
	pub status: IncidentStatus,
	pub urgency: Urgency,
	pub created_at: DateTime<Utc>,
	pub service: ServiceReference,
	#[serde(default)]
	pub summary: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub html_url: String,
	#[serde_as(deserialize_as = "DefaultOnNull")]
	#[serde(default)]
	pub pending_actions: Vec<PendingAction>,
}

impl Incident {
	/// summary text, falls back to the title for incidents without summary
	pub fn display_summary(&self) -> &str {
		if self.summary.is_empty() {
			&self.title
		} else {
			&self.summary
		}
	}

	pub fn has_pending_actions(&self) -> bool {
		!self.pending_actions.is_empty()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct User {
	#[serde(default)]
	pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reference {
	pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Service {
	#[serde(default)]
	pub escalation_policy: Option<Reference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserReference {
	pub id: String,
	#[serde(default)]
	pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// on-call assignment of a user within an escalation policy
pub struct OnCall {
	#[serde(default)]
	pub escalation_level: u32,
	#[serde(default)]
	pub user: Option<UserReference>,
}

#[derive(Debug, Deserialize)]
pub(super) struct IncidentsPage {
	#[serde(default)]
	pub incidents: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UserEnvelope {
	#[serde(default)]
	pub user: User,
}

#[derive(Debug, Deserialize)]
pub(super) struct ServiceEnvelope {
	#[serde(default)]
	pub service: Service,
}

#[derive(Debug, Deserialize)]
pub(super) struct OnCallsPage {
	#[serde(default)]
	pub oncalls: Vec<OnCall>,
}
