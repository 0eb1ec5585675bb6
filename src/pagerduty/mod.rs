//! read-only client for the pagerduty rest api v2
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use url::Url;

pub use self::models::{Incident, IncidentStatus, OnCall, Service, Urgency, User};
use self::models::{IncidentsPage, OnCallsPage, ServiceEnvelope, UserEnvelope};
use crate::http_client;

pub mod models;

/// base url used if none is configured
const DEFAULT_BASE_URL: &str = "https://api.pagerduty.com";

#[derive(Debug, Deserialize, Clone)]
/// pagerduty access settings
pub struct PagerDutySettings {
	/// rest api token
	#[serde(default)]
	pub api_token: String,
	/// api base url, defaults to [DEFAULT_BASE_URL]
	#[serde(default)]
	pub base_url: Option<Url>,
}

impl PagerDutySettings {
	fn endpoint(&self, path: &str) -> String {
		let base = self.base_url.as_ref().map_or(DEFAULT_BASE_URL, Url::as_str);
		format!("{}/{}", base.trim_end_matches('/'), path)
	}
}

/// Error occuring when talking to pagerduty
#[derive(Debug, Error)]
pub enum Error {
	/// transport error or timeout
	#[error("http request failed: {0}")]
	Http(#[from] reqwest::Error),
	/// non-2xx response
	#[error("pagerduty responded with {status}: {body}")]
	Status { status: u16, body: String },
	/// response body didn't match the expected shape
	#[error("failed to decode pagerduty response: {0}")]
	Decode(#[from] serde_json::Error),
}

/// the read operations the reminder needs from the incident source
#[async_trait]
pub trait IncidentSource: Send + Sync {
	/// list open incidents with the given urgency and one of `statuses`
	async fn list_incidents(
		&self,
		urgency: Urgency,
		statuses: &[IncidentStatus],
		limit: usize,
	) -> Result<Vec<Incident>, Error>;

	async fn get_user(&self, user_id: &str) -> Result<User, Error>;

	async fn get_service(&self, service_id: &str) -> Result<Service, Error>;

	/// on-call assignments of an escalation policy
	async fn list_oncalls(&self, escalation_policy_id: &str) -> Result<Vec<OnCall>, Error>;
}

#[derive(Debug, Clone)]
pub struct PagerDutyClient {
	http: http_client::Client,
	settings: PagerDutySettings,
}

impl PagerDutyClient {
	pub fn new(settings: &PagerDutySettings, timeout: Duration) -> Result<Self> {
		Ok(Self { http: http_client::Client::new("pagerduty", timeout)?, settings: settings.clone() })
	}

	fn get(&self, path: &str) -> RequestBuilder {
		self.http
			.get(&self.settings.endpoint(path))
			.header(header::AUTHORIZATION, format!("Token token={}", self.settings.api_token))
			.header(header::ACCEPT, "application/vnd.pagerduty+json;version=2")
	}

	/// send request and decode a successful json response
	async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, Error> {
		let response = self.http.execute(request).await?;
		let status = response.status();

		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(Error::Status { status: status.as_u16(), body });
		}

		let body = response.bytes().await?;
		Ok(serde_json::from_slice(&body)?)
	}
}

#[async_trait]
impl IncidentSource for PagerDutyClient {
	async fn list_incidents(
		&self,
		urgency: Urgency,
		statuses: &[IncidentStatus],
		limit: usize,
	) -> Result<Vec<Incident>, Error> {
		let mut query = vec![("urgencies[]", urgency.as_str().to_owned())];
		query.extend(statuses.iter().map(|status| ("statuses[]", status.as_str().to_owned())));
		query.push(("limit", limit.to_string()));

		let page: IncidentsPage = self.fetch(self.get("incidents").query(&query)).await?;

		// a single malformed record must not hide the others
		let incidents = page
			.incidents
			.into_iter()
			.filter_map(|value| match serde_json::from_value::<Incident>(value) {
				Ok(incident) => Some(incident),
				Err(err) => {
					tracing::warn!("skipping malformed incident record: {}", err);
					None
				}
			})
			.collect();

		Ok(incidents)
	}

	async fn get_user(&self, user_id: &str) -> Result<User, Error> {
		let envelope: UserEnvelope = self.fetch(self.get(&format!("users/{user_id}"))).await?;
		Ok(envelope.user)
	}

	async fn get_service(&self, service_id: &str) -> Result<Service, Error> {
		let envelope: ServiceEnvelope =
			self.fetch(self.get(&format!("services/{service_id}"))).await?;
		Ok(envelope.service)
	}

	async fn list_oncalls(&self, escalation_policy_id: &str) -> Result<Vec<OnCall>, Error> {
		let page: OnCallsPage = self
			.fetch(self.get("oncalls").query(&[("escalation_policy_ids[]", escalation_policy_id)]))
			.await?;
		Ok(page.oncalls)
	}
}
