use std::sync::atomic::{
  AtomicI64,
  Ordering
};

use chrono::{
  DateTime,
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;

/// Source of "now" for cache expiry and of
/// "today" for calendar markers.
pub trait Clock: Send + Sync {
  fn now_millis(&self) -> i64;

  fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock {
  timezone: Option<Tz>
}

impl SystemClock {
  pub fn new(timezone: Option<Tz>) -> Self {
    Self { timezone }
  }
}

impl Clock for SystemClock {
  fn now_millis(&self) -> i64 {
    Utc::now().timestamp_millis()
  }

  fn today(&self) -> NaiveDate {
    match self.timezone {
      | Some(tz) => {
        Utc::now()
          .with_timezone(&tz)
          .date_naive()
      }
      | None => Local::now().date_naive()
    }
  }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
  millis: AtomicI64
}

impl FixedClock {
  pub fn new(millis: i64) -> Self {
    Self {
      millis: AtomicI64::new(millis)
    }
  }

  /// Clock pinned to noon UTC of `date`.
  pub fn at_date(date: NaiveDate) -> Self {
    let millis = date
      .and_hms_opt(12, 0, 0)
      .map(|dt| {
        dt.and_utc().timestamp_millis()
      })
      .unwrap_or_default();
    Self::new(millis)
  }

  pub fn set(&self, millis: i64) {
    self
      .millis
      .store(millis, Ordering::SeqCst);
  }

  pub fn advance(&self, millis: i64) {
    self
      .millis
      .fetch_add(millis, Ordering::SeqCst);
  }
}

impl Clock for FixedClock {
  fn now_millis(&self) -> i64 {
    self.millis.load(Ordering::SeqCst)
  }

  fn today(&self) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(
      self.now_millis()
    )
    .map(|dt| dt.date_naive())
    .unwrap_or(NaiveDate::MIN)
  }
}

/// Parses a timezone id, logging and
/// returning `None` when it is invalid.
pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved timezone"
      );
      Some(tz)
    }
    | Err(error) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %error,
        "invalid timezone id"
      );
      None
    }
  }
}
