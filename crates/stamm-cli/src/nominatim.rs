//! [`Geocoder`] backed by a Nominatim-compatible search endpoint.

use anyhow::Context as _;
use reqwest::Client;
use serde::Deserialize;
use stamm_core::location::Coordinates;
use stamm_service::{GeocodeError, GeocodeFuture, Geocoder};

use crate::config::GeocodeConfig;

pub struct Nominatim {
  client:   Client,
  endpoint: String,
}

/// One search hit. Nominatim reports coordinates as strings.
#[derive(Debug, Deserialize)]
struct Hit {
  lat: String,
  lon: String,
}

impl Hit {
  fn coordinates(&self) -> Result<Coordinates, GeocodeError> {
    let parse = |v: &str| {
      v.parse::<f64>().map_err(|e| GeocodeError::new(format!("bad coordinate {v:?}: {e}")))
    };
    Ok(Coordinates { latitude: parse(&self.lat)?, longitude: parse(&self.lon)? })
  }
}

impl Nominatim {
  pub fn new(config: &GeocodeConfig) -> anyhow::Result<Self> {
    let client = Client::builder()
      .user_agent(config.user_agent.clone())
      .timeout(config.timeout())
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, endpoint: config.endpoint.clone() })
  }

  async fn search(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
    let resp = self
      .client
      .get(&self.endpoint)
      .query(&[("q", query), ("format", "json"), ("limit", "1")])
      .send()
      .await
      .map_err(|e| GeocodeError::new(format!("request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
      return Err(GeocodeError::new(format!("HTTP {status}")));
    }
    let hits: Vec<Hit> = resp
      .json()
      .await
      .map_err(|e| GeocodeError::new(format!("bad response body: {e}")))?;
    hits.first().map(Hit::coordinates).transpose()
  }
}

impl Geocoder for Nominatim {
  fn geocode<'a>(&'a self, query: &'a str) -> GeocodeFuture<'a> { Box::pin(self.search(query)) }
}
