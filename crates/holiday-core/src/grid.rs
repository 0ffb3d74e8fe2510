//! Calendar layout arithmetic: month, week
//! and year grids, ISO week numbers and
//! day-clamped month/year shifting. Pure
//! functions only.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Weekday
};
use serde::{
  Deserialize,
  Serialize
};

use crate::model::{
  HolidayRecord,
  YearHolidayMap
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
  #[default]
  Sunday,
  Monday
}

impl WeekStart {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Sunday => "sunday",
      | Self::Monday => "monday"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    let key = key.trim();
    if key.eq_ignore_ascii_case("sunday")
      || key.eq_ignore_ascii_case("sun")
    {
      Some(Self::Sunday)
    } else if key
      .eq_ignore_ascii_case("monday")
      || key.eq_ignore_ascii_case("mon")
    {
      Some(Self::Monday)
    } else {
      None
    }
  }

  pub fn weekday(self) -> Weekday {
    match self {
      | Self::Sunday => Weekday::Sun,
      | Self::Monday => Weekday::Mon
    }
  }
}

/// One day of a rendered grid. Rebuilt on
/// every layout pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCell {
  pub date:              NaiveDate,
  pub is_current_period: bool,
  pub is_today:          bool,
  pub is_selected:       bool,
  pub is_weekend:        bool,
  pub holiday:           Option<HolidayRecord>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
  pub year:       i32,
  pub month:      u32,
  pub week_start: WeekStart,
  pub cells:      Vec<CalendarCell>
}

impl MonthGrid {
  pub fn rows(
    &self
  ) -> impl Iterator<Item = &[CalendarCell]>
  {
    self.cells.chunks(7)
  }

  /// ISO week number shown beside each row.
  pub fn week_numbers(&self) -> Vec<u32> {
    self
      .rows()
      .filter_map(|row| row.first())
      .map(|cell| {
        row_week_number(
          cell.date,
          self.week_start
        )
      })
      .collect()
  }
}

/// Holiday data that can answer "what is
/// on this date".
pub trait HolidayLookup {
  fn holiday_on(
    &self,
    date: NaiveDate
  ) -> Option<&HolidayRecord>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHolidays;

impl HolidayLookup for NoHolidays {
  fn holiday_on(
    &self,
    _date: NaiveDate
  ) -> Option<&HolidayRecord> {
    None
  }
}

impl HolidayLookup for YearHolidayMap {
  fn holiday_on(
    &self,
    date: NaiveDate
  ) -> Option<&HolidayRecord> {
    self.get(&date)
  }
}

impl HolidayLookup
  for BTreeMap<i32, YearHolidayMap>
{
  fn holiday_on(
    &self,
    date: NaiveDate
  ) -> Option<&HolidayRecord> {
    self
      .get(&date.year())
      .and_then(|map| map.get(&date))
  }
}

/// Per-render inputs that mark cells.
#[derive(Clone, Copy)]
pub struct GridContext<'a> {
  pub today:    NaiveDate,
  pub selected: Option<NaiveDate>,
  pub holidays: &'a dyn HolidayLookup
}

impl<'a> GridContext<'a> {
  pub fn new(
    today: NaiveDate,
    selected: Option<NaiveDate>,
    holidays: &'a dyn HolidayLookup
  ) -> Self {
    Self {
      today,
      selected,
      holidays
    }
  }

  fn cell(
    &self,
    date: NaiveDate,
    is_current_period: bool
  ) -> CalendarCell {
    CalendarCell {
      date,
      is_current_period,
      is_today: date == self.today,
      is_selected: self.selected
        == Some(date),
      is_weekend: is_weekend(date),
      holiday: self
        .holidays
        .holiday_on(date)
        .cloned()
    }
  }
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: WeekStart
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .weekday()
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}

pub fn end_of_week(
  day: NaiveDate,
  week_start: WeekStart
) -> NaiveDate {
  add_days(
    start_of_week(day, week_start),
    6
  )
}

/// Moves by whole months, clamping the day
/// to the end of the destination month.
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let mut year = date.year();
  let mut month =
    date.month() as i32 + months;

  while month < 1 {
    month += 12;
    year = year.saturating_sub(1);
  }
  while month > 12 {
    month -= 12;
    year = year.saturating_add(1);
  }

  let month = month as u32;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

pub fn shift_years(
  date: NaiveDate,
  years: i32
) -> NaiveDate {
  let year =
    date.year().saturating_add(years);
  let month = date.month();
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

/// Same day-of-month in another month of
/// the same year, clamped.
pub fn with_month_clamped(
  date: NaiveDate,
  month: u32
) -> NaiveDate {
  if !(1..=12).contains(&month) {
    return date;
  }
  let day = date
    .day()
    .min(days_in_month(date.year(), month));
  NaiveDate::from_ymd_opt(
    date.year(),
    month,
    day
  )
  .unwrap_or(date)
}

/// Same month and day in another year,
/// clamped (Feb 29 becomes Feb 28).
pub fn with_year_clamped(
  date: NaiveDate,
  year: i32
) -> NaiveDate {
  shift_years(date, year - date.year())
}

/// ISO-8601 week number (1..=53); weeks
/// start on Monday whatever the display
/// preference.
pub fn iso_week_number(
  date: NaiveDate
) -> u32 {
  date.iso_week().week()
}

/// ISO week-numbering year paired with the
/// week number.
pub fn iso_week(
  date: NaiveDate
) -> (i32, u32) {
  let week = date.iso_week();
  (week.year(), week.week())
}

fn row_week_number(
  row_start: NaiveDate,
  week_start: WeekStart
) -> u32 {
  match week_start {
    | WeekStart::Monday => {
      iso_week_number(row_start)
    }
    | WeekStart::Sunday => {
      iso_week_number(add_days(
        row_start, 1
      ))
    }
  }
}

pub fn is_weekend(date: NaiveDate) -> bool {
  matches!(
    date.weekday(),
    Weekday::Sat | Weekday::Sun
  )
}

pub fn weekday_labels(
  week_start: WeekStart
) -> [&'static str; 7] {
  match week_start {
    | WeekStart::Sunday => {
      [
        "Sun", "Mon", "Tue", "Wed",
        "Thu", "Fri", "Sat",
      ]
    }
    | WeekStart::Monday => {
      [
        "Mon", "Tue", "Wed", "Thu",
        "Fri", "Sat", "Sun",
      ]
    }
  }
}

/// First and last displayed day of a month
/// grid; always whole weeks.
pub fn month_grid_bounds(
  year: i32,
  month: u32,
  week_start: WeekStart
) -> (NaiveDate, NaiveDate) {
  let first =
    first_day_of_month(year, month);
  let last =
    last_day_of_month(year, month);
  (
    start_of_week(first, week_start),
    end_of_week(last, week_start)
  )
}

pub fn month_grid(
  year: i32,
  month: u32,
  week_start: WeekStart,
  ctx: &GridContext<'_>
) -> Vec<CalendarCell> {
  if !(1..=12).contains(&month) {
    tracing::warn!(
      year,
      month,
      "month out of range; empty grid"
    );
    return Vec::new();
  }

  let (grid_start, grid_end) =
    month_grid_bounds(
      year, month, week_start
    );
  let span = (grid_end - grid_start)
    .num_days()
    + 1;

  (0..span)
    .map(|offset| {
      let day =
        add_days(grid_start, offset);
      ctx.cell(
        day,
        day.year() == year
          && day.month() == month
      )
    })
    .collect()
}

pub fn week_grid(
  week_start_date: NaiveDate,
  ctx: &GridContext<'_>
) -> Vec<CalendarCell> {
  (0_i64..7_i64)
    .map(|offset| {
      ctx.cell(
        add_days(week_start_date, offset),
        true
      )
    })
    .collect()
}

pub fn year_grid(
  year: i32,
  week_start: WeekStart,
  ctx: &GridContext<'_>
) -> Vec<MonthGrid> {
  (1_u32..=12_u32)
    .map(|month| {
      MonthGrid {
        year,
        month,
        week_start,
        cells: month_grid(
          year, month, week_start, ctx
        )
      }
    })
    .collect()
}

/// Calendar years touched by a date span;
/// holiday data is needed for each.
pub fn years_spanned(
  start: NaiveDate,
  end: NaiveDate
) -> RangeInclusive<i32> {
  let (low, high) = if start <= end {
    (start, end)
  } else {
    (end, start)
  };
  low.year()..=high.year()
}
