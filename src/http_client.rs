//! shared http client for the pagerduty and slack apis. Records prometheus
//! meters for every request.
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use prometheus::{HistogramVec, IntCounterVec};
use reqwest::{RequestBuilder, Response};

static METRICS: OnceCell<Metrics> = OnceCell::new();

#[derive(Debug)]
/// prometheus meters for outgoing api requests
struct Metrics {
	/// total number of http requests
	http_requests: IntCounterVec,
	/// total number of failed http requests
	http_requests_failed: IntCounterVec,
	/// time spent by http requests
	http_request_duration: HistogramVec,
}

impl Metrics {
	/// get or register the process wide meters
	fn global() -> Result<&'static Self, prometheus::Error> {
		METRICS.get_or_try_init(Self::new)
	}

	/// construct and register prometheus meters
	fn new() -> Result<Self, prometheus::Error> {
		use prometheus::{
			exponential_buckets, histogram_opts, opts, register_histogram_vec,
			register_int_counter_vec,
		};

		let http_requests = register_int_counter_vec!(
			opts!("requests_total", "total number of http requests")
				.namespace("pd_reminder")
				.subsystem("http_client"),
			&["api", "host"]
		)?;

		let http_requests_failed = register_int_counter_vec!(
			opts!("requests_failed", "number of failed http requests")
				.namespace("pd_reminder")
				.subsystem("http_client"),
			&["api", "host", "status_code"]
		)?;

		let http_request_duration = register_histogram_vec!(
			histogram_opts!(
				"request_duration_seconds",
				"total time of a http request in seconds",
				exponential_buckets(0.01, 2., 12)?
			)
			.subsystem("http_client")
			.namespace("pd_reminder"),
			&["api", "host"]
		)?;

		Ok(Self { http_requests, http_requests_failed, http_request_duration })
	}
}

#[derive(Debug, Clone)]
/// Http client used by the api clients. Doesn't retry: a failed call is
/// simply repeated on the next poll.
pub struct Client {
	/// http client
	client: reqwest::Client,
	/// name of the api, used as metric label
	api: &'static str,
	/// prometheus meters for http requests
	metrics: &'static Metrics,
}

impl Client {
	/// construct http client, every request is bounded by `timeout`
	pub fn new(api: &'static str, timeout: Duration) -> Result<Self> {
		Ok(Self {
			client: reqwest::Client::builder()
				.timeout(timeout)
				.build()
				.context("failed to build reqwest client")?,
			api,
			metrics: Metrics::global().context("failed to register prometheus meters")?,
		})
	}

	/// start building a GET request
	pub fn get(&self, url: &str) -> RequestBuilder {
		self.client.get(url)
	}

	/// start building a POST request
	pub fn post(&self, url: &str) -> RequestBuilder {
		self.client.post(url)
	}

	/// send a request and record it. Non-2xx responses are returned as they
	/// are, the caller decides what they mean.
	pub async fn execute(&self, request: RequestBuilder) -> Result<Response, reqwest::Error> {
		let request = request.build()?;
		let host = request.url().host_str().unwrap_or_default().to_owned();

		let _timer =
			self.metrics.http_request_duration.with_label_values(&[self.api, &host]).start_timer();
		self.metrics.http_requests.with_label_values(&[self.api, &host]).inc();

		match self.client.execute(request).await {
			Ok(response) => {
				if !response.status().is_success() {
					self.metrics
						.http_requests_failed
						.with_label_values(&[self.api, &host, response.status().as_str()])
						.inc();
				}
				Ok(response)
			}
			Err(err) => {
				self.metrics.http_requests_failed.with_label_values(&[self.api, &host, ""]).inc();
				Err(err)
			}
		}
	}
}
