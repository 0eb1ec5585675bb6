use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use thiserror::Error;

use crate::{
	exclusion_list::ExclusionList,
	log::LogSettings,
	pagerduty::PagerDutySettings,
	reminder::{ScheduleSettings, ThresholdSettings},
	renderer::TemplateSettings,
	slack::SlackSettings,
	telemetry_endpoint::TelemetryEndpointSettings,
};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// config file used if neither `--config` nor `CONFIG_FILE_PATH` is given
const DEFAULT_CONFIG_PATH: &str = "./config.yaml";
/// prefix of environment variables overriding config file values
const ENV_PREFIX: &str = "PD_REMINDER";

/// Error occuring while loading the settings
#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("can't load config: {0}")]
	Config(#[from] config::ConfigError),
	/// a required token is missing or empty
	#[error("{0} is missing, check the config file or environment")]
	MissingCredential(&'static str),
	/// an hour of the schedule outside of 0..=23, or an empty working hours window
	#[error("invalid schedule: {0}")]
	InvalidSchedule(String),
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub pagerduty: PagerDutySettings,
	pub slack: SlackSettings,
	#[serde(default)]
	pub incident_thresholds: ThresholdSettings,
	#[serde(default)]
	pub excluded_services: ExclusionList,
	#[serde(default)]
	pub schedule: ScheduleSettings,
	/// timeout of every single api call
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	#[serde(default = "Settings::default_request_timeout")]
	pub request_timeout: Duration,
	#[serde(default)]
	pub templates: TemplateSettings,
	#[serde(default)]
	pub log: LogSettings,
	#[serde(default)]
	pub telemetry_endpoint: Option<TelemetryEndpointSettings>,
	/// run a single sweep and exit, only set from the command line
	#[serde(skip)]
	pub run_once: bool,
}

impl Settings {
	fn default_request_timeout() -> Duration {
		Duration::from_secs(10)
	}

	/// load settings from command line, config file and environment. Must be
	/// called once before [Settings::global].
	pub fn init() -> Result<&'static Self> {
		SETTINGS.get_or_try_init(Self::load)
	}

	pub fn global() -> &'static Self {
		#[allow(clippy::expect_used)]
		SETTINGS.get().expect("settings accessed before Settings::init")
	}

	fn load() -> Result<Self> {
		let opts = Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.args(&[
				Arg::new("config")
					.help("path of config file, defaults to $CONFIG_FILE_PATH or ./config.yaml")
					.takes_value(true)
					.short('c')
					.long("config"),
				Arg::new("level")
					.help("log level")
					.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
				Arg::new("once").help("run a single sweep and exit").long("once"),
			])
			.get_matches();

		let (config_path, required) = match opts.value_of("config") {
			Some(path) => (path.to_owned(), true),
			None => match std::env::var("CONFIG_FILE_PATH") {
				Ok(path) => (path, true),
				Err(_) => (DEFAULT_CONFIG_PATH.to_owned(), false),
			},
		};

		let builder = Config::builder()
			.add_source(File::with_name(&config_path).required(required))
			.add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("__").separator("__"));

		let mut settings = Self::build(builder).context(format!("can't load config {config_path}"))?;

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_owned();
		}
		settings.run_once = opts.is_present("once");

		Ok(settings)
	}

	/// deserialize the merged sources and check the required credentials
	fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
		let settings: Self = builder.build()?.try_deserialize()?;
		settings.validate()?;
		Ok(settings)
	}

	fn validate(&self) -> Result<(), SettingsError> {
		let required = [
			("pagerduty.api_token", &self.pagerduty.api_token),
			("slack.bot_token", &self.slack.bot_token),
			("slack.channel", &self.slack.channel),
		];

		if let Some((name, _)) = required.into_iter().find(|(_, value)| value.trim().is_empty()) {
			return Err(SettingsError::MissingCredential(name));
		}

		let schedule = &self.schedule;
		if schedule.reset_hour > 23 {
			return Err(SettingsError::InvalidSchedule(format!(
				"reset_hour {} is not an hour of the day",
				schedule.reset_hour
			)));
		}

		// end_hour is exclusive, 24 keeps the window open until midnight
		let window = &schedule.working_hours;
		if window.end_hour > 24 || window.start_hour >= window.end_hour {
			return Err(SettingsError::InvalidSchedule(format!(
				"working hours {}..{} are empty or exceed a day",
				window.start_hour, window.end_hour
			)));
		}

		Ok(())
	}
}
