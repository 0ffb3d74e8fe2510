//! Case-insensitive name search over the
//! holidays of a window of years.

use std::ops::RangeInclusive;

use chrono::NaiveDate;
use tracing::{
  debug,
  instrument,
  warn
};

use crate::api::HolidayApi;
use crate::config::YearRange;
use crate::error::FetchOutcome;
use crate::model::HolidayRecord;
use crate::service::HolidayService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
  pub date:        NaiveDate,
  pub holiday:     HolidayRecord,
  pub source_year: i32
}

/// `center ± radius`, cut to `bounds` when
/// given. Empty when the window lies wholly
/// outside the bounds.
pub fn search_years(
  center: i32,
  radius: u32,
  bounds: Option<YearRange>
) -> RangeInclusive<i32> {
  let radius =
    i32::try_from(radius).unwrap_or(i32::MAX);
  let mut low = center.saturating_sub(radius);
  let mut high =
    center.saturating_add(radius);
  if let Some(bounds) = bounds {
    low = low.max(bounds.min);
    high = high.min(bounds.max);
  }
  low..=high
}

/// Holidays whose name contains `query`,
/// ascending by date. Each year is fetched
/// or served from cache first; a year that
/// fails to load is skipped.
#[instrument(skip(service))]
pub async fn search<A: HolidayApi>(
  service: &HolidayService<A>,
  query: &str,
  country: &str,
  center_year: i32,
  year_radius: u32,
  bounds: Option<YearRange>
) -> Vec<SearchResult> {
  let needle = query.trim().to_lowercase();
  if needle.is_empty() {
    return Vec::new();
  }

  let mut results = Vec::new();
  for year in
    search_years(center_year, year_radius, bounds)
  {
    let map = match service
      .fetch_year_holidays(year, country)
      .await
    {
      | FetchOutcome::Loaded(map)
      | FetchOutcome::Empty(map) => map,
      | FetchOutcome::Failed(err) => {
        warn!(
          year,
          error = %err,
          "skipping year in search"
        );
        continue;
      }
    };

    results.extend(
      map
        .iter()
        .filter(|holiday| {
          holiday.matches_name(&needle)
        })
        .map(|holiday| {
          SearchResult {
            date:        holiday.date,
            holiday:     holiday.clone(),
            source_year: year
          }
        })
    );
  }

  results.sort_by_key(|r| r.date);
  debug!(count = results.len(), "search finished");
  results
}
