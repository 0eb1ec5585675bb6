//! Renders reminder messages via tera templates.
//!
//! Built-in templates are used unless a template file is configured.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tera::Tera;

use crate::pagerduty::Incident;

/// name of the template for the message posted to the channel
const PRIMARY: &str = "primary";
/// name of the template for the follow-up posted into the thread
const THREAD: &str = "thread";

const DEFAULT_PRIMARY: &str = "Hi {{ mentions }}, I see that <{{ incident.html_url }}|{{ incident.summary }}> \
	(Impacted Service: {{ service }}) has been open for more than {{ elapsed }} in status {{ status }}. \
	Is anyone working on it?";

const DEFAULT_THREAD: &str = "If work is in progress, set a snooze time on \
	<{{ incident.html_url }}|{{ incident.summary }}> for the planned duration so we don't ping you while you work.";

#[derive(Debug, Clone, Default, Deserialize)]
/// optional template files overriding the built-in messages
pub struct TemplateSettings {
	pub primary: Option<String>,
	pub thread: Option<String>,
}

#[derive(Debug, Serialize)]
struct IncidentView<'a> {
	id: &'a str,
	summary: &'a str,
	html_url: &'a str,
	status: &'static str,
}

#[derive(Debug, Serialize)]
/// values available to the templates
pub struct ReminderContext<'a> {
	/// comma separated chat mentions of the on-call responders
	mentions: &'a str,
	incident: IncidentView<'a>,
	/// display name of the impacted service
	service: &'a str,
	/// time since the incident was created, whole seconds
	elapsed: &'a str,
	status: &'static str,
}

impl<'a> ReminderContext<'a> {
	pub fn new(incident: &'a Incident, mentions: &'a str, elapsed: &'a str) -> Self {
		Self {
			mentions,
			incident: IncidentView {
				id: &incident.id,
				summary: incident.display_summary(),
				html_url: &incident.html_url,
				status: incident.status.as_str(),
			},
			service: &incident.service.summary,
			elapsed,
			status: incident.status.as_str(),
		}
	}
}

/// Reminder message renderer
pub struct MessageRenderer {
	tera: Tera,
}

impl MessageRenderer {
	/// Load the built-in templates and override them with the configured files.
	/// A template that fails to parse is an error.
	pub fn new(settings: &TemplateSettings) -> Result<Self> {
		let mut tera = Tera::default();

		tera.add_raw_template(PRIMARY, DEFAULT_PRIMARY)
			.context("could not load default primary template")?;
		tera.add_raw_template(THREAD, DEFAULT_THREAD)
			.context("could not load default thread template")?;

		if let Some(path) = &settings.primary {
			tera.add_template_file(path, Some(PRIMARY))
				.context(format!("could not load primary template {path}"))?;
		}
		if let Some(path) = &settings.thread {
			tera.add_template_file(path, Some(THREAD))
				.context(format!("could not load thread template {path}"))?;
		}

		Ok(Self { tera })
	}

	/// message posted to the channel
	pub fn render_primary(&self, context: &ReminderContext<'_>) -> Result<String, tera::Error> {
		self.render(PRIMARY, context)
	}

	/// follow-up posted into the thread of the primary message
	pub fn render_thread(&self, context: &ReminderContext<'_>) -> Result<String, tera::Error> {
		self.render(THREAD, context)
	}

	fn render(&self, name: &str, context: &ReminderContext<'_>) -> Result<String, tera::Error> {
		self.tera.render(name, &tera::Context::from_serialize(context)?)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn incident() -> Incident {
		serde_json::from_value(json!({
			"id": "INC-1",
			"status": "triggered",
			"urgency": "high",
			"created_at": "2024-06-12T08:00:00Z",
			"service": { "id": "S1", "summary": "billing" },
			"summary": "billing api 5xx",
			"html_url": "https://example.pagerduty.com/incidents/INC-1",
		}))
		.unwrap()
	}

	#[test]
	fn default_templates() {
		let renderer = MessageRenderer::new(&TemplateSettings::default()).unwrap();
		let incident = incident();
		let context = ReminderContext::new(&incident, "<@U1>, <@U2>", "0:40:00");

		let primary = renderer.render_primary(&context).unwrap();
		assert_eq!(
			primary,
			"Hi <@U1>, <@U2>, I see that <https://example.pagerduty.com/incidents/INC-1|billing api 5xx> \
			 (Impacted Service: billing) has been open for more than 0:40:00 in status triggered. \
			 Is anyone working on it?"
		);

		let thread = renderer.render_thread(&context).unwrap();
		assert!(thread.contains("snooze"));
		assert!(thread.contains("<https://example.pagerduty.com/incidents/INC-1|billing api 5xx>"));
	}

	#[test]
	fn missing_template_file_is_an_error() {
		let settings = TemplateSettings {
			primary: Some("/nonexistent/primary.tera".to_owned()),
			thread: None,
		};

		assert!(MessageRenderer::new(&settings).is_err());
	}
}
