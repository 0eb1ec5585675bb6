//! client for the parts of the slack web api the reminder posts through
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::http_client;

/// base url used if none is configured
const DEFAULT_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Deserialize, Clone)]
/// slack access settings
pub struct SlackSettings {
	/// bot token (`xoxb-...`)
	#[serde(default)]
	pub bot_token: String,
	/// channel reminders are posted to
	#[serde(default)]
	pub channel: String,
	/// web api base url, defaults to [DEFAULT_BASE_URL]
	#[serde(default)]
	pub base_url: Option<Url>,
}

impl SlackSettings {
	fn endpoint(&self, method: &str) -> String {
		let base = self.base_url.as_ref().map_or(DEFAULT_BASE_URL, Url::as_str);
		format!("{}/{}", base.trim_end_matches('/'), method)
	}
}

/// Error occuring when talking to slack
#[derive(Debug, Error)]
pub enum Error {
	/// transport error or timeout
	#[error("http request failed: {0}")]
	Http(#[from] reqwest::Error),
	/// non-2xx response
	#[error("slack responded with {status}: {body}")]
	Status { status: u16, body: String },
	/// `ok: false` response
	#[error("slack api error: {0}")]
	Api(String),
	/// response body didn't match the expected shape
	#[error("failed to decode slack response: {0}")]
	Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// a posted message which can be replied to in a thread
pub struct ThreadHandle {
	pub channel: String,
	/// timestamp of the parent message
	pub ts: String,
}

/// the chat operations the reminder needs
#[async_trait]
pub trait ChatNotifier: Send + Sync {
	/// post a message, returns a handle to its thread if slack reported one
	async fn post_message(&self, channel: &str, text: &str) -> Result<Option<ThreadHandle>, Error>;

	async fn post_thread_reply(&self, thread: &ThreadHandle, text: &str) -> Result<(), Error>;

	/// resolve an email into a mention token (`<@U123>`)
	async fn lookup_user_by_email(&self, email: &str) -> Result<String, Error>;
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
	ok: bool,
	#[serde(default)]
	ts: Option<String>,
	#[serde(default)]
	error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
	id: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
	ok: bool,
	#[serde(default)]
	user: Option<SlackUser>,
	#[serde(default)]
	error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SlackClient {
	http: http_client::Client,
	settings: SlackSettings,
}

impl SlackClient {
	pub fn new(settings: &SlackSettings, timeout: Duration) -> Result<Self> {
		Ok(Self { http: http_client::Client::new("slack", timeout)?, settings: settings.clone() })
	}

	/// send request and decode a successful json response. Slack reports most
	/// api errors with status 200 and `ok: false`, callers check that.
	async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, Error> {
		let response = self.http.execute(request.bearer_auth(&self.settings.bot_token)).await?;
		let status = response.status();

		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(Error::Status { status: status.as_u16(), body });
		}

		let body = response.bytes().await?;
		Ok(serde_json::from_slice(&body)?)
	}

	async fn post(&self, body: serde_json::Value) -> Result<PostMessageResponse, Error> {
		let response: PostMessageResponse =
			self.fetch(self.http.post(&self.settings.endpoint("chat.postMessage")).json(&body)).await?;

		if !response.ok {
			return Err(Error::Api(response.error.unwrap_or_else(|| "unknown_error".to_owned())));
		}

		Ok(response)
	}
}

#[async_trait]
impl ChatNotifier for SlackClient {
	async fn post_message(&self, channel: &str, text: &str) -> Result<Option<ThreadHandle>, Error> {
		let response = self.post(json!({ "channel": channel, "text": text })).await?;

		Ok(response.ts.map(|ts| ThreadHandle { channel: channel.to_owned(), ts }))
	}

	async fn post_thread_reply(&self, thread: &ThreadHandle, text: &str) -> Result<(), Error> {
		self.post(json!({ "channel": thread.channel, "thread_ts": thread.ts, "text": text }))
			.await?;
		Ok(())
	}

	async fn lookup_user_by_email(&self, email: &str) -> Result<String, Error> {
		let response: LookupResponse = self
			.fetch(
				self.http
					.get(&self.settings.endpoint("users.lookupByEmail"))
					.query(&[("email", email)]),
			)
			.await?;

		match response {
			LookupResponse { ok: true, user: Some(user), .. } => Ok(format!("<@{}>", user.id)),
			LookupResponse { error, .. } => {
				Err(Error::Api(error.unwrap_or_else(|| "users_not_found".to_owned())))
			}
		}
	}
}
