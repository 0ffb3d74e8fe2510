use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  NaiveDate
};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::clock::parse_timezone;
use crate::grid::WeekStart;
use crate::state::{
  Theme,
  ViewMode
};

const CONFIG_ENV_VAR: &str =
  "HOLIDAYS_CONFIG";
const APP_DIR_NAME: &str =
  "holiday-calendar";
const CONFIG_FILE_NAME: &str =
  "config.toml";

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

fn default_api_base_url() -> String {
  "https://date.nager.at/api/v3"
    .to_string()
}

fn default_country() -> String {
  "FR".to_string()
}

fn default_language() -> String {
  "en".to_string()
}

fn default_min_year_offset() -> i32 {
  -100
}

fn default_max_year_offset() -> i32 {
  100
}

fn default_holiday_ttl_hours() -> u32 {
  24
}

fn default_country_ttl_days() -> u32 {
  7
}

fn default_search_year_radius() -> u32 {
  1
}

fn default_request_timeout_secs() -> u64
{
  30
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HolidayConfig {
  pub api_base_url:         String,
  pub default_country:      String,
  pub default_language:     String,
  pub default_theme:        Theme,
  pub default_view:         ViewMode,
  pub week_starts_on:       WeekStart,
  pub min_year_offset:      i32,
  pub max_year_offset:      i32,
  pub holiday_ttl_hours:    u32,
  pub upcoming_ttl_hours:   u32,
  pub country_ttl_days:     u32,
  pub search_year_radius:   u32,
  pub request_timeout_secs: u64,
  pub timezone:             Option<String>,
  pub data_dir:             Option<PathBuf>
}

impl Default for HolidayConfig {
  fn default() -> Self {
    Self {
      api_base_url:
        default_api_base_url(),
      default_country: default_country(),
      default_language:
        default_language(),
      default_theme: Theme::Light,
      default_view: ViewMode::Month,
      week_starts_on: WeekStart::Sunday,
      min_year_offset:
        default_min_year_offset(),
      max_year_offset:
        default_max_year_offset(),
      holiday_ttl_hours:
        default_holiday_ttl_hours(),
      upcoming_ttl_hours:
        default_holiday_ttl_hours(),
      country_ttl_days:
        default_country_ttl_days(),
      search_year_radius:
        default_search_year_radius(),
      request_timeout_secs:
        default_request_timeout_secs(),
      timezone: None,
      data_dir: None
    }
  }
}

impl HolidayConfig {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let path = resolve_config_path(
      config_override
    )?;
    let Some(path) = path else {
      warn!(
        "no config file found; using \
         defaults"
      );
      return Ok(Self::default());
    };

    if !path.exists() {
      if config_override.is_some() {
        return Err(anyhow!(
          "config file {} does not exist",
          path.display()
        ));
      }
      warn!(file = %path.display(), "config file not found; using defaults");
      return Ok(Self::default());
    }

    info!(file = %path.display(), "loading config");
    let raw = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    Self::from_toml_str(&raw)
      .with_context(|| {
        format!(
          "failed parsing {}",
          path.display()
        )
      })
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let mut config =
      toml::from_str::<Self>(raw)?;
    config.sanitize();
    Ok(config)
  }

  /// Applies `key=value` overrides on top
  /// of the loaded file.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k.trim();
      let value = v.trim();
      debug!(key = %key, value = %value, "applying override");
      self.set_key(key, value)?;
    }
    self.sanitize();
    Ok(())
  }

  fn set_key(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    match key {
      | "api_base_url" => {
        self.api_base_url =
          value.to_string();
      }
      | "default_country" => {
        self.default_country =
          value.to_string();
      }
      | "default_language" => {
        self.default_language =
          value.to_string();
      }
      | "default_theme" => {
        self.default_theme =
          Theme::from_key(value)
            .ok_or_else(|| {
              anyhow!(
                "invalid theme: {value}"
              )
            })?;
      }
      | "default_view" => {
        self.default_view =
          ViewMode::from_key(value)
            .ok_or_else(|| {
              anyhow!(
                "invalid view: {value}"
              )
            })?;
      }
      | "week_starts_on" => {
        self.week_starts_on =
          WeekStart::from_key(value)
            .ok_or_else(|| {
              anyhow!(
                "invalid week start: \
                 {value}"
              )
            })?;
      }
      | "min_year_offset" => {
        self.min_year_offset =
          parse_number(key, value)?;
      }
      | "max_year_offset" => {
        self.max_year_offset =
          parse_number(key, value)?;
      }
      | "holiday_ttl_hours" => {
        self.holiday_ttl_hours =
          parse_number(key, value)?;
      }
      | "upcoming_ttl_hours" => {
        self.upcoming_ttl_hours =
          parse_number(key, value)?;
      }
      | "country_ttl_days" => {
        self.country_ttl_days =
          parse_number(key, value)?;
      }
      | "search_year_radius" => {
        self.search_year_radius =
          parse_number(key, value)?;
      }
      | "request_timeout_secs" => {
        self.request_timeout_secs =
          parse_number(key, value)?;
      }
      | "timezone" => {
        self.timezone =
          (!value.is_empty())
            .then(|| value.to_string());
      }
      | "data_dir" => {
        self.data_dir =
          (!value.is_empty())
            .then(|| PathBuf::from(value));
      }
      | other => {
        return Err(anyhow!(
          "unknown config key: {other}"
        ));
      }
    }
    Ok(())
  }

  fn sanitize(&mut self) {
    if self.api_base_url.trim().is_empty()
    {
      self.api_base_url =
        default_api_base_url();
    }

    let country = self
      .default_country
      .trim()
      .to_ascii_uppercase();
    self.default_country =
      if country.is_empty() {
        default_country()
      } else {
        country
      };

    if self
      .default_language
      .trim()
      .is_empty()
    {
      self.default_language =
        default_language();
    }

    // The current year must stay navigable.
    if self.min_year_offset > 0 {
      warn!(
        min = self.min_year_offset,
        "min_year_offset excludes the \
         current year; using default"
      );
      self.min_year_offset =
        default_min_year_offset();
    }
    if self.max_year_offset < 0 {
      warn!(
        max = self.max_year_offset,
        "max_year_offset excludes the \
         current year; using default"
      );
      self.max_year_offset =
        default_max_year_offset();
    }

    if self.holiday_ttl_hours == 0 {
      self.holiday_ttl_hours =
        default_holiday_ttl_hours();
    }
    if self.upcoming_ttl_hours == 0 {
      self.upcoming_ttl_hours =
        default_holiday_ttl_hours();
    }
    if self.country_ttl_days == 0 {
      self.country_ttl_days =
        default_country_ttl_days();
    }
    if self.request_timeout_secs == 0 {
      self.request_timeout_secs =
        default_request_timeout_secs();
    }
  }

  pub fn holiday_ttl_millis(&self) -> i64 {
    i64::from(self.holiday_ttl_hours)
      * HOUR_MS
  }

  pub fn upcoming_ttl_millis(
    &self
  ) -> i64 {
    i64::from(self.upcoming_ttl_hours)
      * HOUR_MS
  }

  pub fn country_ttl_millis(&self) -> i64 {
    i64::from(self.country_ttl_days)
      * DAY_MS
  }

  pub fn request_timeout(
    &self
  ) -> Duration {
    Duration::from_secs(
      self.request_timeout_secs
    )
  }

  /// Navigable year bounds around `today`.
  pub fn year_range(
    &self,
    today: NaiveDate
  ) -> YearRange {
    YearRange {
      min: today
        .year()
        .saturating_add(
          self.min_year_offset
        ),
      max: today
        .year()
        .saturating_add(
          self.max_year_offset
        )
    }
  }

  pub fn timezone(&self) -> Option<Tz> {
    self.timezone.as_deref().and_then(
      |raw| parse_timezone(raw, "config")
    )
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct YearRange {
  pub min: i32,
  pub max: i32
}

impl YearRange {
  pub fn contains(
    &self,
    year: i32
  ) -> bool {
    (self.min..=self.max).contains(&year)
  }
}

fn parse_number<T>(
  key: &str,
  value: &str
) -> anyhow::Result<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display
{
  value.parse::<T>().map_err(|err| {
    anyhow!(
      "invalid value for {key}: \
       {value} ({err})"
    )
  })
}

#[tracing::instrument(skip(
  config_override
))]
fn resolve_config_path(
  config_override: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = config_override {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if trimmed == "/dev/null" {
      return Ok(None);
    }
    if !trimmed.is_empty() {
      return Ok(Some(PathBuf::from(
        trimmed
      )));
    }
  }

  Ok(dirs::config_dir().map(|dir| {
    dir
      .join(APP_DIR_NAME)
      .join(CONFIG_FILE_NAME)
  }))
}

/// Directory for the durable cache and
/// stored preferences.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &HolidayConfig,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(path) =
    cfg.data_dir.as_ref()
  {
    expand_tilde(path)
  } else {
    dirs::data_dir()
      .ok_or_else(|| {
        anyhow!(
          "cannot determine data \
           directory"
        )
      })?
      .join(APP_DIR_NAME)
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
