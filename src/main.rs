//! pagerduty incident reminder for slack
//!
//! Features:
//! - reminds the level 1 on-call responders of a service in slack about high
//!   urgency incidents which stay triggered or acknowledged for too long
//! - at most one reminder per incident per day, incidents with pending actions
//!   (e.g. snoozed ones) are left alone
//! - threaded snooze hint during working hours

use anyhow::{Context, Result};
use chrono::Utc;
use pagerduty::PagerDutyClient;
use reminder::{Reminder, ReminderConfig, ReminderState};
use renderer::MessageRenderer;
use settings::Settings;
use slack::SlackClient;

mod exclusion_list;
mod http_client;
mod log;
mod pagerduty;
mod reminder;
mod renderer;
mod settings;
mod slack;
mod telemetry_endpoint;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// resolves once the process receives ctrl-c
async fn interrupted() {
	match tokio::signal::ctrl_c().await {
		Ok(()) => tracing::info!("received interrupt, shutting down"),
		Err(err) => {
			// without a signal handler we can only be stopped by being killed
			tracing::error!("failed to listen for interrupt: {}", err);
			std::future::pending::<()>().await;
		}
	}
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::init().context("failed to load config and command line arguments")?;

	log::setup_logging().context("could not setup logging")?;

	if let Err(err) = run(settings).await {
		tracing::error!("unrecoverable error: {:#}", err);
		return Err(err);
	}

	Ok(())
}

async fn run(settings: &'static Settings) -> Result<()> {
	if let Some(endpoint) = settings.telemetry_endpoint.clone() {
		tokio::spawn(async move {
			if let Err(err) = telemetry_endpoint::run_telemetry_endpoint(endpoint).await {
				tracing::error!("{:#}", err);
			}
		});
	}

	let pagerduty = PagerDutyClient::new(&settings.pagerduty, settings.request_timeout)
		.context("failed to construct pagerduty client")?;
	let slack = SlackClient::new(&settings.slack, settings.request_timeout)
		.context("failed to construct slack client")?;
	let renderer =
		MessageRenderer::new(&settings.templates).context("failed to construct message renderer")?;

	let reminder = Reminder::new(pagerduty, slack, renderer, ReminderConfig::from(settings))
		.context("failed to construct reminder")?;
	let mut state = ReminderState::default();

	if settings.run_once {
		reminder.poll(&mut state, Utc::now()).await;
		return Ok(());
	}

	tracing::info!(
		channel = settings.slack.channel.as_str(),
		excluded_services = settings.excluded_services.len(),
		"started, sweeping every {:?}",
		reminder.poll_interval()
	);

	reminder.run(&mut state, interrupted()).await;

	Ok(())
}
