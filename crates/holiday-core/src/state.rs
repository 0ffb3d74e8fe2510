//! Process-wide view state and the change
//! notifications emitted when it moves.

use chrono::{
  Datelike,
  NaiveDate
};
use serde::{
  Deserialize,
  Serialize
};

use crate::grid::WeekStart;

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
pub enum ViewMode {
  #[default]
  Month,
  Week,
  Year
}

impl ViewMode {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Month => "month",
      | Self::Week => "week",
      | Self::Year => "year"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "month" => Some(Self::Month),
      | "week" => Some(Self::Week),
      | "year" => Some(Self::Year),
      | _ => None
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Self::Month => "Month",
      | Self::Week => "Week",
      | Self::Year => "Year"
    }
  }
}

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
pub enum Theme {
  #[default]
  Light,
  Dark
}

impl Theme {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Light => "light",
      | Self::Dark => "dark"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "light" => Some(Self::Light),
      | "dark" => Some(Self::Dark),
      | _ => None
    }
  }
}

/// Everything the calendar shows. `month`
/// is 1-based. `week_anchor` is the first
/// day of the week shown in week view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
  pub view:           ViewMode,
  pub year:           i32,
  pub month:          u32,
  pub week_anchor:    Option<NaiveDate>,
  pub week_starts_on: WeekStart,
  pub selected_date:  Option<NaiveDate>,
  pub country:        String,
  pub language:       String,
  pub theme:          Theme
}

impl ViewState {
  /// Month view of `today` with nothing
  /// selected.
  pub fn new(
    today: NaiveDate,
    country: &str,
    language: &str
  ) -> Self {
    Self {
      view:           ViewMode::Month,
      year:           today.year(),
      month:          today.month(),
      week_anchor:    None,
      week_starts_on: WeekStart::Sunday,
      selected_date:  None,
      country:        country.to_string(),
      language:       language.to_string(),
      theme:          Theme::Light
    }
  }

  /// The selected date, or the first of the
  /// displayed month.
  pub fn focus_date(&self) -> NaiveDate {
    self.selected_date.unwrap_or_else(|| {
      crate::grid::first_day_of_month(
        self.year, self.month
      )
    })
  }

  pub fn shows_month_of(
    &self,
    date: NaiveDate
  ) -> bool {
    date.year() == self.year
      && date.month() == self.month
  }
}

/// What a view layer needs to know after a
/// state update.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum StateChange {
  View,
  Period,
  Selection,
  Country,
  Language,
  Theme,
  WeekStart,
  Holidays,
  Upcoming,
  Countries,
  Search,
  Loading,
  Error
}

/// Pending notifications. Repeated changes
/// coalesce into one render request.
#[derive(Debug, Default)]
pub struct ChangeLog {
  changes:        Vec<StateChange>,
  render_pending: bool
}

impl ChangeLog {
  pub fn push(
    &mut self,
    change: StateChange
  ) {
    if !self.changes.contains(&change) {
      self.changes.push(change);
    }
    self.render_pending = true;
  }

  pub fn render_pending(&self) -> bool {
    self.render_pending
  }

  pub fn take(
    &mut self
  ) -> Vec<StateChange> {
    self.render_pending = false;
    std::mem::take(&mut self.changes)
  }
}
