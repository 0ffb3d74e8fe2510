use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{
  info,
  instrument,
  warn
};

use crate::error::FetchError;

/// Raw response of the remote holiday API:
/// status code plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
  pub status: u16,
  pub body:   String
}

impl ApiResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Transport seam for the remote holiday
/// API. Implementations report only
/// transport failures as errors; every
/// status code comes back as a response.
pub trait HolidayApi: Send + Sync {
  fn get(
    &self,
    path: &str
  ) -> impl Future<
    Output = Result<ApiResponse, FetchError>
  > + Send;
}

impl<T: HolidayApi> HolidayApi for Arc<T> {
  fn get(
    &self,
    path: &str
  ) -> impl Future<
    Output = Result<ApiResponse, FetchError>
  > + Send {
    (**self).get(path)
  }
}

pub fn public_holidays_path(
  year: i32,
  country_code: &str
) -> String {
  format!(
    "PublicHolidays/{year}/{country_code}"
  )
}

pub fn next_public_holidays_path(
  country_code: &str
) -> String {
  format!(
    "NextPublicHolidays/{country_code}"
  )
}

pub const AVAILABLE_COUNTRIES_PATH: &str =
  "AvailableCountries";

/// `HolidayApi` over HTTPS with reqwest.
#[derive(Debug, Clone)]
pub struct HttpHolidayApi {
  client:   reqwest::Client,
  base_url: String
}

impl HttpHolidayApi {
  pub fn new(
    base_url: &str,
    timeout: Duration
  ) -> anyhow::Result<Self> {
    let client =
      reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context(
          "failed building HTTP client \
           for holiday API"
        )?;

    Ok(Self {
      client,
      base_url: base_url
        .trim()
        .trim_end_matches('/')
        .to_string()
    })
  }

  pub fn url_for(
    &self,
    path: &str
  ) -> String {
    format!(
      "{}/{}",
      self.base_url,
      path.trim_start_matches('/')
    )
  }
}

impl HolidayApi for HttpHolidayApi {
  #[instrument(skip(self))]
  async fn get(
    &self,
    path: &str
  ) -> Result<ApiResponse, FetchError> {
    let url = self.url_for(path);
    info!(url = %url, "requesting holiday API");

    let response = match self
      .client
      .get(url.as_str())
      .header(
        reqwest::header::ACCEPT,
        "application/json"
      )
      .header(
        reqwest::header::USER_AGENT,
        concat!(
          "holiday-calendar/",
          env!("CARGO_PKG_VERSION")
        )
      )
      .send()
      .await
    {
      | Ok(response) => response,
      | Err(error) => {
        warn!(
          url = %url,
          error = %error,
          "failed requesting holiday API"
        );
        return Err(
          FetchError::Transport(
            error.to_string()
          )
        );
      }
    };

    let status = response.status();
    let body = match response.text().await
    {
      | Ok(body) => body,
      | Err(error) => {
        warn!(
          url = %url,
          status = %status,
          error = %error,
          "failed reading holiday API \
           response body"
        );
        return Err(
          FetchError::Transport(
            error.to_string()
          )
        );
      }
    };

    if !status.is_success() {
      warn!(
        url = %url,
        status = %status,
        "holiday API returned \
         non-success status"
      );
    }

    Ok(ApiResponse {
      status: status.as_u16(),
      body
    })
  }
}
