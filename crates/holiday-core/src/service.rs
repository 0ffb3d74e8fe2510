//! Cache-or-network retrieval of yearly
//! holidays, upcoming holidays and the
//! country list.
//!
//! No fetch method returns an error to its
//! caller. Failures land in the error slot of
//! [`FetchStatus`] and come back as
//! [`FetchOutcome::Failed`]; the cache entry
//! for the key is left as it was.

use std::sync::Arc;

use chrono::{
  Datelike,
  NaiveDate
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tracing::{
  debug,
  info,
  instrument,
  warn
};

use crate::api::{
  AVAILABLE_COUNTRIES_PATH,
  ApiResponse,
  HolidayApi,
  next_public_holidays_path,
  public_holidays_path
};
use crate::cache::{
  Cache,
  CacheKey
};
use crate::clock::Clock;
use crate::config::HolidayConfig;
use crate::error::{
  FetchError,
  FetchOutcome
};
use crate::model::{
  ApiCountry,
  ApiHoliday,
  Country,
  HolidayRecord,
  YearHolidayMap
};
use crate::store::KeyValueStore;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(
  Debug, Clone, PartialEq, Eq, Hash,
)]
pub struct YearKey {
  pub country: String,
  pub year:    i32
}

impl CacheKey for YearKey {
  fn storage_key(&self) -> String {
    format!(
      "holidays-{}-{}",
      self.year, self.country
    )
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Hash,
)]
pub struct UpcomingKey(pub String);

impl CacheKey for UpcomingKey {
  fn storage_key(&self) -> String {
    format!("upcoming-{}", self.0)
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Hash,
)]
pub struct CountriesKey;

impl CacheKey for CountriesKey {
  fn storage_key(&self) -> String {
    "availableCountries".to_string()
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct CacheTtls {
  pub holidays_ms:  i64,
  pub upcoming_ms:  i64,
  pub countries_ms: i64
}

impl Default for CacheTtls {
  fn default() -> Self {
    Self {
      holidays_ms:  DAY_MS,
      upcoming_ms:  DAY_MS,
      countries_ms: 7 * DAY_MS
    }
  }
}

impl CacheTtls {
  pub fn from_config(
    cfg: &HolidayConfig
  ) -> Self {
    Self {
      holidays_ms:  cfg.holiday_ttl_millis(),
      upcoming_ms:  cfg
        .upcoming_ttl_millis(),
      countries_ms: cfg
        .country_ttl_millis()
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum FetchKind {
  Holidays,
  Upcoming,
  Countries
}

impl FetchKind {
  fn index(self) -> usize {
    match self {
      | Self::Holidays => 0,
      | Self::Upcoming => 1,
      | Self::Countries => 2
    }
  }
}

/// Loading flags and last errors, one slot
/// per resource kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchStatus {
  in_flight: [usize; 3],
  errors:    [Option<FetchError>; 3]
}

impl FetchStatus {
  pub fn is_loading(
    &self,
    kind: FetchKind
  ) -> bool {
    self.in_flight[kind.index()] > 0
  }

  pub fn is_any_loading(&self) -> bool {
    self.in_flight.iter().any(|n| *n > 0)
  }

  pub fn error(
    &self,
    kind: FetchKind
  ) -> Option<&FetchError> {
    self.errors[kind.index()].as_ref()
  }
}

/// Holds the loading flag of one kind up
/// until dropped, on every exit path.
struct LoadingGuard<'a> {
  status: &'a Mutex<FetchStatus>,
  kind:   FetchKind
}

impl<'a> LoadingGuard<'a> {
  fn begin(
    status: &'a Mutex<FetchStatus>,
    kind: FetchKind
  ) -> Self {
    status.lock().in_flight[kind.index()] +=
      1;
    Self { status, kind }
  }
}

impl Drop for LoadingGuard<'_> {
  fn drop(&mut self) {
    let mut status = self.status.lock();
    let slot =
      &mut status.in_flight[self.kind.index()];
    *slot = slot.saturating_sub(1);
  }
}

pub struct HolidayService<A> {
  api:       A,
  holidays:  Cache<YearKey, YearHolidayMap>,
  upcoming:
    Cache<UpcomingKey, Vec<HolidayRecord>>,
  countries: Cache<CountriesKey, Vec<Country>>,
  status:    Mutex<FetchStatus>
}

impl<A: HolidayApi> HolidayService<A> {
  pub fn new(
    api: A,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttls: CacheTtls
  ) -> Self {
    Self {
      api,
      holidays: Cache::new(
        "holidays",
        ttls.holidays_ms,
        store.clone(),
        clock.clone()
      ),
      upcoming: Cache::new(
        "upcoming",
        ttls.upcoming_ms,
        store.clone(),
        clock.clone()
      ),
      countries: Cache::new(
        "countries",
        ttls.countries_ms,
        store,
        clock
      ),
      status: Mutex::new(
        FetchStatus::default()
      )
    }
  }

  pub fn status(&self) -> FetchStatus {
    self.status.lock().clone()
  }

  pub fn is_loading(
    &self,
    kind: FetchKind
  ) -> bool {
    self.status.lock().is_loading(kind)
  }

  pub fn last_error(
    &self,
    kind: FetchKind
  ) -> Option<FetchError> {
    self.status.lock().error(kind).cloned()
  }

  pub fn clear_error(
    &self,
    kind: FetchKind
  ) {
    self.status.lock().errors
      [kind.index()] = None;
  }

  /// Holidays of `country` in `year`. HTTP
  /// 404 is a confirmed empty year and is
  /// cached like any other result.
  #[instrument(skip(self))]
  pub async fn fetch_year_holidays(
    &self,
    year: i32,
    country: &str
  ) -> FetchOutcome<YearHolidayMap> {
    let _loading = LoadingGuard::begin(
      &self.status,
      FetchKind::Holidays
    );
    let key = YearKey {
      country: normalize_country(country),
      year
    };

    if let Some(map) = self.holidays.get(&key)
    {
      self.clear_error(FetchKind::Holidays);
      return classify(map, |m| m.is_empty());
    }

    let path =
      public_holidays_path(year, &key.country);
    let result = match self
      .api
      .get(&path)
      .await
    {
      | Ok(response) if response.status == 404 => {
        debug!(year, country = %key.country, "no holidays recorded upstream");
        Ok(YearHolidayMap::new())
      }
      | Ok(response) => {
        decode::<Vec<ApiHoliday>>(&response)
          .map(|raw| {
            YearHolidayMap::from_records(
              raw
                .into_iter()
                .map(HolidayRecord::from)
            )
          })
      }
      | Err(err) => Err(err)
    };

    match result {
      | Ok(map) => {
        info!(
          year,
          country = %key.country,
          count = map.len(),
          "fetched holidays"
        );
        self.holidays.put(&key, map.clone());
        self.clear_error(FetchKind::Holidays);
        classify(map, |m| m.is_empty())
      }
      | Err(err) => {
        self.fail(FetchKind::Holidays, err)
      }
    }
  }

  /// The rolling list of next holidays for a
  /// country. HTTP 204 is a confirmed empty
  /// list.
  #[instrument(skip(self))]
  pub async fn fetch_upcoming_holidays(
    &self,
    country: &str
  ) -> FetchOutcome<Vec<HolidayRecord>> {
    let _loading = LoadingGuard::begin(
      &self.status,
      FetchKind::Upcoming
    );
    let key = UpcomingKey(
      normalize_country(country)
    );

    if let Some(list) = self.upcoming.get(&key)
    {
      self.clear_error(FetchKind::Upcoming);
      return classify(list, |l| l.is_empty());
    }

    let path =
      next_public_holidays_path(&key.0);
    let result = match self
      .api
      .get(&path)
      .await
    {
      | Ok(response) if response.status == 204 => {
        debug!(country = %key.0, "no upcoming holidays");
        Ok(Vec::new())
      }
      | Ok(response) => {
        decode::<Vec<ApiHoliday>>(&response)
          .map(|raw| {
            let mut list: Vec<HolidayRecord> =
              raw
                .into_iter()
                .map(HolidayRecord::from)
                .collect();
            list.sort_by_key(|h| h.date);
            list
          })
      }
      | Err(err) => Err(err)
    };

    match result {
      | Ok(list) => {
        self.upcoming.put(&key, list.clone());
        self.clear_error(FetchKind::Upcoming);
        classify(list, |l| l.is_empty())
      }
      | Err(err) => {
        self.fail(FetchKind::Upcoming, err)
      }
    }
  }

  /// Supported countries sorted by display
  /// name.
  #[instrument(skip(self))]
  pub async fn fetch_available_countries(
    &self
  ) -> FetchOutcome<Vec<Country>> {
    let _loading = LoadingGuard::begin(
      &self.status,
      FetchKind::Countries
    );

    if let Some(list) =
      self.countries.get(&CountriesKey)
    {
      self.clear_error(FetchKind::Countries);
      return classify(list, |l| l.is_empty());
    }

    let result = match self
      .api
      .get(AVAILABLE_COUNTRIES_PATH)
      .await
    {
      | Ok(response) => {
        decode::<Vec<ApiCountry>>(&response)
          .map(|raw| {
            let mut list: Vec<Country> = raw
              .into_iter()
              .map(Country::from)
              .collect();
            list.sort_by(|a, b| {
              a.name.cmp(&b.name)
            });
            list
          })
      }
      | Err(err) => Err(err)
    };

    match result {
      | Ok(list) => {
        self
          .countries
          .put(&CountriesKey, list.clone());
        self.clear_error(FetchKind::Countries);
        classify(list, |l| l.is_empty())
      }
      | Err(err) => {
        self.fail(FetchKind::Countries, err)
      }
    }
  }

  /// Cached holidays of a year, without any
  /// network access.
  pub fn cached_year_holidays(
    &self,
    year: i32,
    country: &str
  ) -> Option<YearHolidayMap> {
    self.holidays.get(&YearKey {
      country: normalize_country(country),
      year
    })
  }

  /// Cached holiday on `date`, if any.
  pub fn holiday_on(
    &self,
    date: NaiveDate,
    country: &str
  ) -> Option<HolidayRecord> {
    self
      .cached_year_holidays(
        date.year(),
        country
      )
      .and_then(|map| map.get(&date).cloned())
  }

  pub fn invalidate_year(
    &self,
    year: i32,
    country: &str
  ) {
    self.holidays.invalidate(&YearKey {
      country: normalize_country(country),
      year
    });
  }

  pub fn invalidate_upcoming(
    &self,
    country: &str
  ) {
    self.upcoming.invalidate(&UpcomingKey(
      normalize_country(country)
    ));
  }

  pub fn invalidate_countries(&self) {
    self.countries.invalidate(&CountriesKey);
  }

  /// Drops every in-process entry; durable
  /// entries stay until they expire.
  pub fn forget_memory(&self) {
    self.holidays.forget_memory();
    self.upcoming.forget_memory();
    self.countries.forget_memory();
  }

  fn fail<T>(
    &self,
    kind: FetchKind,
    err: FetchError
  ) -> FetchOutcome<T> {
    warn!(?kind, error = %err, "fetch failed");
    self.status.lock().errors[kind.index()] =
      Some(err.clone());
    FetchOutcome::Failed(err)
  }
}

pub fn normalize_country(
  country: &str
) -> String {
  country.trim().to_ascii_uppercase()
}

fn classify<T>(
  data: T,
  is_empty: impl Fn(&T) -> bool
) -> FetchOutcome<T> {
  if is_empty(&data) {
    FetchOutcome::Empty(data)
  } else {
    FetchOutcome::Loaded(data)
  }
}

fn decode<T: DeserializeOwned>(
  response: &ApiResponse
) -> Result<T, FetchError> {
  if !response.is_success() {
    return Err(FetchError::HttpStatus {
      status: response.status
    });
  }
  serde_json::from_str::<T>(&response.body)
    .map_err(|err| {
      FetchError::MalformedData(
        err.to_string()
      )
    })
}
