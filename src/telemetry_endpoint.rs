//! Here we expose prometheus metrics about the reminder
use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use axum::{
	http::{header::CONTENT_TYPE, StatusCode},
	response::IntoResponse,
	routing::get,
	Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryEndpointSettings {
	pub bind_address: IpAddr,
	pub port: u16,
}

impl TelemetryEndpointSettings {
	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

async fn metrics_handler() -> Result<impl IntoResponse, StatusCode> {
	let mut buffer = vec![];
	let encoder = TextEncoder::new();
	let metric_families = prometheus::gather();

	encoder.encode(&metric_families, &mut buffer).map_err(|err| {
		tracing::warn!("failed to encode metrics: {}", err);
		StatusCode::INTERNAL_SERVER_ERROR
	})?;

	Ok(([(CONTENT_TYPE, encoder.format_type().to_owned())], buffer))
}

pub async fn run_telemetry_endpoint(settings: TelemetryEndpointSettings) -> Result<()> {
	let app = Router::new().route("/metrics", get(metrics_handler));

	axum::Server::bind(&settings.to_socket_addr())
		.serve(app.into_make_service())
		.await
		.context("telemetry endpoint crashed")?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn metrics_are_served_as_prometheus_text() {
		let response = metrics_handler().await.into_response();

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(
			response.headers().get(CONTENT_TYPE).unwrap(),
			"text/plain; version=0.0.4"
		);
	}
}
