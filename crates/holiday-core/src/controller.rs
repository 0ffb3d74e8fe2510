//! Owns the single [`ViewState`] and every
//! transition on it.
//!
//! State is guarded by a mutex that is never
//! held across a network await. Each
//! transition that moves the displayed
//! period loads holiday data for every year
//! the new grid touches before it returns.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{
  Datelike,
  NaiveDate
};
use parking_lot::Mutex;
use regex::Regex;
use tracing::{
  debug,
  info,
  instrument,
  warn
};

use crate::api::HolidayApi;
use crate::clock::Clock;
use crate::config::{
  HolidayConfig,
  YearRange
};
use crate::error::{
  FetchError,
  FetchOutcome,
  ValidationError
};
use crate::grid::{
  self,
  CalendarCell,
  GridContext,
  MonthGrid,
  WeekStart
};
use crate::model::{
  Country,
  HolidayRecord,
  YearHolidayMap
};
use crate::prefs;
use crate::search::{
  self,
  SearchResult
};
use crate::service::{
  FetchKind,
  HolidayService,
  normalize_country
};
use crate::state::{
  ChangeLog,
  StateChange,
  Theme,
  ViewMode,
  ViewState
};
use crate::store::KeyValueStore;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Direction {
  Prev,
  Next
}

impl Direction {
  fn step(self) -> i32 {
    match self {
      | Self::Prev => -1,
      | Self::Next => 1
    }
  }
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
  pub default_country:  String,
  pub default_language: String,
  pub default_theme:    Theme,
  pub default_view:     ViewMode,
  pub week_starts_on:   WeekStart,
  pub year_range:       YearRange,
  pub search_radius:    u32
}

impl ControllerSettings {
  pub fn from_config(
    cfg: &HolidayConfig,
    today: NaiveDate
  ) -> Self {
    Self {
      default_country:  cfg
        .default_country
        .clone(),
      default_language: cfg
        .default_language
        .clone(),
      default_theme:    cfg.default_theme,
      default_view:     cfg.default_view,
      week_starts_on:   cfg.week_starts_on,
      year_range:       cfg
        .year_range(today),
      search_radius:    cfg
        .search_year_radius
    }
  }
}

/// Layout of the current view, cells marked
/// with whatever holidays are cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarView {
  Month(MonthGrid),
  Week(Vec<CalendarCell>),
  Year(Vec<MonthGrid>)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayInfo {
  pub date:     NaiveDate,
  pub is_today: bool,
  pub iso_week: u32,
  pub holiday:  Option<HolidayRecord>
}

#[derive(Debug, Default)]
struct SearchState {
  query:   String,
  results: Vec<SearchResult>,
  open:    bool
}

struct Inner {
  state:     ViewState,
  changes:   ChangeLog,
  upcoming:  Option<Vec<HolidayRecord>>,
  countries: Option<Vec<Country>>,
  search:    SearchState
}

pub struct CalendarController<A> {
  service:  HolidayService<A>,
  prefs:    Arc<dyn KeyValueStore>,
  clock:    Arc<dyn Clock>,
  settings: ControllerSettings,
  inner:    Mutex<Inner>
}

impl<A: HolidayApi> CalendarController<A> {
  /// Builds the controller from defaults,
  /// then restores stored preferences.
  pub fn new(
    service: HolidayService<A>,
    prefs_store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    settings: ControllerSettings
  ) -> Self {
    let today = clock.today();
    let state = restore_state(
      prefs_store.as_ref(),
      today,
      &settings
    );
    info!(
      view = state.view.as_key(),
      year = state.year,
      month = state.month,
      country = %state.country,
      "calendar state initialised"
    );

    Self {
      service,
      prefs: prefs_store,
      clock,
      settings,
      inner: Mutex::new(Inner {
        state,
        changes: ChangeLog::default(),
        upcoming: None,
        countries: None,
        search: SearchState::default()
      })
    }
  }

  pub fn service(
    &self
  ) -> &HolidayService<A> {
    &self.service
  }

  pub fn state(&self) -> ViewState {
    self.inner.lock().state.clone()
  }

  pub fn year_range(&self) -> YearRange {
    self.settings.year_range
  }

  pub fn today(&self) -> NaiveDate {
    self.clock.today()
  }

  /// Drains pending notifications and the
  /// render request they imply.
  pub fn take_changes(
    &self
  ) -> Vec<StateChange> {
    self.inner.lock().changes.take()
  }

  pub fn render_pending(&self) -> bool {
    self.inner.lock().changes.render_pending()
  }

  /// Initial load: holidays for the visible
  /// grid, the upcoming list and the country
  /// list.
  #[instrument(skip(self))]
  pub async fn start(&self) {
    self.load_visible_holidays().await;
    self.refresh_upcoming().await;
    self.refresh_countries().await;
  }

  #[instrument(skip(self))]
  pub async fn switch_view(
    &self,
    view: ViewMode
  ) {
    {
      let mut inner = self.inner.lock();
      if inner.state.view == view {
        return;
      }
      inner.state.view = view;
      if view == ViewMode::Week
        && inner.state.week_anchor.is_none()
      {
        let anchor = grid::start_of_week(
          inner.state.focus_date(),
          inner.state.week_starts_on
        );
        debug!(%anchor, "initialising week anchor");
        inner.state.week_anchor = Some(anchor);
      }
      inner.changes.push(StateChange::View);
    }
    prefs::save_view(self.prefs.as_ref(), view);
    self.load_visible_holidays().await;
  }

  /// Steps the displayed period by one unit
  /// of the current view. In week view the
  /// selection moves with the week so the
  /// stored date reopens the same week.
  /// Returns `false` when the step would
  /// leave the year range; nothing changes
  /// then.
  #[instrument(skip(self))]
  pub async fn navigate(
    &self,
    direction: Direction
  ) -> bool {
    let range = self.settings.year_range;
    let step = direction.step();
    let selection = {
      let mut inner = self.inner.lock();
      let state = &mut inner.state;

      match state.view {
        | ViewMode::Month => {
          let target = grid::shift_months(
            grid::first_day_of_month(
              state.year,
              state.month
            ),
            step
          );
          if !range.contains(target.year()) {
            return false;
          }
          if let Some(selected) =
            state.selected_date
            && state.shows_month_of(selected)
          {
            state.selected_date = Some(
              grid::shift_months(
                selected, step
              )
            );
          }
          state.year = target.year();
          state.month = target.month();
        }
        | ViewMode::Week => {
          let anchor = state
            .week_anchor
            .unwrap_or_else(|| {
              grid::start_of_week(
                state.focus_date(),
                state.week_starts_on
              )
            });
          let days = i64::from(step) * 7;
          let target =
            grid::add_days(anchor, days);
          if !range.contains(target.year()) {
            return false;
          }
          state.selected_date =
            Some(match state.selected_date {
              | Some(selected)
                if selected >= anchor
                  && selected
                    <= grid::add_days(
                      anchor, 6
                    ) =>
              {
                grid::add_days(selected, days)
              }
              | _ => target
            });
          state.week_anchor = Some(target);
          state.year = target.year();
          state.month = target.month();
        }
        | ViewMode::Year => {
          let target =
            state.year.saturating_add(step);
          if !range.contains(target) {
            debug!(
              year = target,
              "year navigation out of range"
            );
            return false;
          }
          if let Some(selected) =
            state.selected_date
            && selected.year() == state.year
          {
            state.selected_date = Some(
              grid::shift_years(
                selected, step
              )
            );
          }
          state.year = target;
        }
      }

      inner.changes.push(StateChange::Period);
      inner.state.selected_date
    };

    prefs::save_selected_date(
      self.prefs.as_ref(),
      selection
    );
    self.load_visible_holidays().await;
    true
  }

  #[instrument(skip(self))]
  pub async fn jump_to_today(&self) {
    let today = self.clock.today();
    self.land_on(today).await;
  }

  /// Parses `input`, checks it against the
  /// year range and shows its month with the
  /// date selected. Rejected input leaves the
  /// state untouched.
  #[instrument(skip(self))]
  pub async fn jump_to_date(
    &self,
    input: &str
  ) -> Result<NaiveDate, ValidationError> {
    let date = parse_date_input(input)?;
    self.check_year(date.year())?;
    self.land_on(date).await;
    Ok(date)
  }

  async fn land_on(&self, date: NaiveDate) {
    {
      let mut inner = self.inner.lock();
      let state = &mut inner.state;
      let period_changed = state.view
        != ViewMode::Month
        || !state.shows_month_of(date);

      state.selected_date = Some(date);
      state.year = date.year();
      state.month = date.month();
      state.week_anchor =
        Some(grid::start_of_week(
          date,
          state.week_starts_on
        ));
      state.view = ViewMode::Month;

      if period_changed {
        inner.changes.push(StateChange::Period);
      }
      inner.changes.push(StateChange::Selection);
    }
    prefs::save_selected_date(
      self.prefs.as_ref(),
      Some(date)
    );
    prefs::save_view(
      self.prefs.as_ref(),
      ViewMode::Month
    );
    self.load_visible_holidays().await;
  }

  /// Selects a day. In year view this opens
  /// the day's month; elsewhere a day outside
  /// the shown period moves the period to it.
  #[instrument(skip(self))]
  pub async fn select_date(
    &self,
    date: NaiveDate
  ) -> Result<(), ValidationError> {
    self.check_year(date.year())?;
    let period_changed = {
      let mut inner = self.inner.lock();
      let state = &mut inner.state;

      let period_changed = match state.view
      {
        | ViewMode::Year => {
          state.view = ViewMode::Month;
          state.year = date.year();
          state.month = date.month();
          inner.changes.push(StateChange::View);
          true
        }
        | ViewMode::Month => {
          let moved =
            !state.shows_month_of(date);
          state.year = date.year();
          state.month = date.month();
          moved
        }
        | ViewMode::Week => {
          let ws = state.week_starts_on;
          let anchor = state
            .week_anchor
            .unwrap_or_else(|| {
              grid::start_of_week(date, ws)
            });
          let in_week = date >= anchor
            && date
              <= grid::add_days(anchor, 6);
          if !in_week {
            let anchor =
              grid::start_of_week(date, ws);
            state.week_anchor = Some(anchor);
            state.year = anchor.year();
            state.month = anchor.month();
          }
          !in_week
        }
      };

      let state = &mut inner.state;
      state.selected_date = Some(date);
      if period_changed {
        inner.changes.push(StateChange::Period);
      }
      inner.changes.push(StateChange::Selection);
      period_changed
    };

    prefs::save_selected_date(
      self.prefs.as_ref(),
      Some(date)
    );
    if period_changed {
      self.save_current_view();
      self.load_visible_holidays().await;
    }
    Ok(())
  }

  /// Opens one month from the year view.
  #[instrument(skip(self))]
  pub async fn open_month(
    &self,
    year: i32,
    month: u32
  ) -> Result<(), ValidationError> {
    self.check_year(year)?;
    let first = NaiveDate::from_ymd_opt(
      year, month, 1
    )
    .ok_or_else(|| {
      ValidationError::Unparsable(format!(
        "{year}-{month}"
      ))
    })?;

    {
      let mut inner = self.inner.lock();
      let state = &mut inner.state;
      state.view = ViewMode::Month;
      state.year = year;
      state.month = month;
      if !state
        .selected_date
        .is_some_and(|d| state.shows_month_of(d))
      {
        state.selected_date = Some(first);
      }
      inner.changes.push(StateChange::View);
      inner.changes.push(StateChange::Period);
    }
    self.save_current_view();
    self.load_visible_holidays().await;
    Ok(())
  }

  /// Moves to `month` of the shown year,
  /// keeping the selected day where it
  /// exists.
  #[instrument(skip(self))]
  pub async fn set_month(
    &self,
    month: u32
  ) -> Result<(), ValidationError> {
    if !(1..=12).contains(&month) {
      return Err(ValidationError::Unparsable(
        format!("month {month}")
      ));
    }
    {
      let mut inner = self.inner.lock();
      let state = &mut inner.state;
      let base = state.focus_date();
      let base = if base.year() == state.year
      {
        base
      } else {
        grid::with_year_clamped(
          base, state.year
        )
      };
      let selected =
        grid::with_month_clamped(base, month);
      state.month = month;
      state.selected_date = Some(selected);
      if state.view == ViewMode::Week {
        state.week_anchor =
          Some(grid::start_of_week(
            selected,
            state.week_starts_on
          ));
      }
      inner.changes.push(StateChange::Period);
    }
    self.save_current_view();
    self.load_visible_holidays().await;
    Ok(())
  }

  /// Moves to `year`, clamping Feb 29 of the
  /// selection when needed.
  #[instrument(skip(self))]
  pub async fn set_year(
    &self,
    year: i32
  ) -> Result<(), ValidationError> {
    self.check_year(year)?;
    {
      let mut inner = self.inner.lock();
      let state = &mut inner.state;
      if state.year == year {
        return Ok(());
      }
      let selected = grid::with_year_clamped(
        state.focus_date(),
        year
      );
      state.year = year;
      state.month = selected.month();
      state.selected_date = Some(selected);
      if state.view == ViewMode::Week {
        state.week_anchor =
          Some(grid::start_of_week(
            selected,
            state.week_starts_on
          ));
      }
      inner.changes.push(StateChange::Period);
    }
    self.save_current_view();
    self.load_visible_holidays().await;
    Ok(())
  }

  /// Switches country without moving the
  /// period; holidays and the upcoming list
  /// are reloaded.
  #[instrument(skip(self))]
  pub async fn set_country(
    &self,
    country: &str
  ) {
    let code = normalize_country(country);
    if code.is_empty() {
      warn!("ignoring empty country code");
      return;
    }
    {
      let mut inner = self.inner.lock();
      if inner.state.country == code {
        return;
      }
      inner.state.country = code.clone();
      inner.upcoming = None;
      inner.search = SearchState::default();
      inner.changes.push(StateChange::Country);
      inner.changes.push(StateChange::Search);
    }
    prefs::save_country(
      self.prefs.as_ref(),
      &code
    );
    self.load_visible_holidays().await;
    self.refresh_upcoming().await;
  }

  pub fn set_language(&self, language: &str) {
    let language = language.trim();
    if language.is_empty() {
      return;
    }
    {
      let mut inner = self.inner.lock();
      if inner.state.language == language {
        return;
      }
      inner.state.language =
        language.to_string();
      inner.changes.push(StateChange::Language);
    }
    prefs::save_language(
      self.prefs.as_ref(),
      language
    );
  }

  pub fn set_theme(&self, theme: Theme) {
    {
      let mut inner = self.inner.lock();
      if inner.state.theme == theme {
        return;
      }
      inner.state.theme = theme;
      inner.changes.push(StateChange::Theme);
    }
    prefs::save_theme(
      self.prefs.as_ref(),
      theme
    );
  }

  /// Changes the first weekday; the week
  /// view re-anchors on the new week that
  /// overlaps the old one most.
  #[instrument(skip(self))]
  pub async fn set_week_starts_on(
    &self,
    week_start: WeekStart
  ) {
    {
      let mut inner = self.inner.lock();
      let state = &mut inner.state;
      if state.week_starts_on == week_start {
        return;
      }
      state.week_starts_on = week_start;
      if let Some(anchor) = state.week_anchor
      {
        state.week_anchor =
          Some(grid::start_of_week(
            grid::add_days(anchor, 3),
            week_start
          ));
      }
      inner.changes.push(StateChange::WeekStart);
    }
    prefs::save_week_start(
      self.prefs.as_ref(),
      week_start
    );
    self.load_visible_holidays().await;
  }

  pub fn weekday_headers(
    &self
  ) -> [&'static str; 7] {
    grid::weekday_labels(
      self.inner.lock().state.week_starts_on
    )
  }

  /// Grid for the current state.
  pub fn current_view(&self) -> CalendarView {
    let state = self.state();
    let (start, end) = visible_span(&state);
    let holidays = self.cached_years(
      &state.country,
      start,
      end
    );
    let ctx = GridContext::new(
      self.clock.today(),
      state.selected_date,
      &holidays
    );

    match state.view {
      | ViewMode::Month => {
        CalendarView::Month(MonthGrid {
          year:       state.year,
          month:      state.month,
          week_start: state.week_starts_on,
          cells:      grid::month_grid(
            state.year,
            state.month,
            state.week_starts_on,
            &ctx
          )
        })
      }
      | ViewMode::Week => {
        CalendarView::Week(grid::week_grid(
          start, &ctx
        ))
      }
      | ViewMode::Year => {
        CalendarView::Year(grid::year_grid(
          state.year,
          state.week_starts_on,
          &ctx
        ))
      }
    }
  }

  /// Cached holiday on `date` for the
  /// selected country.
  pub fn holiday_info(
    &self,
    date: NaiveDate
  ) -> Option<HolidayRecord> {
    let country =
      self.inner.lock().state.country.clone();
    self.service.holiday_on(date, &country)
  }

  pub fn day_info(
    &self,
    date: NaiveDate
  ) -> DayInfo {
    DayInfo {
      date,
      is_today: date == self.clock.today(),
      iso_week: grid::iso_week_number(date),
      holiday: self.holiday_info(date)
    }
  }

  pub fn selected_day_info(
    &self
  ) -> Option<DayInfo> {
    let selected =
      self.inner.lock().state.selected_date;
    selected.map(|date| self.day_info(date))
  }

  /// Last good upcoming list, if one was
  /// ever loaded for this country.
  pub fn upcoming(
    &self
  ) -> Option<Vec<HolidayRecord>> {
    self.inner.lock().upcoming.clone()
  }

  pub fn countries(
    &self
  ) -> Option<Vec<Country>> {
    self.inner.lock().countries.clone()
  }

  pub fn last_error(
    &self,
    kind: FetchKind
  ) -> Option<FetchError> {
    self.service.last_error(kind)
  }

  pub fn is_loading(
    &self,
    kind: FetchKind
  ) -> bool {
    self.service.is_loading(kind)
  }

  /// Loads holidays for every year the
  /// visible grid touches. Returns the number
  /// of years that failed.
  #[instrument(skip(self))]
  pub async fn load_visible_holidays(
    &self
  ) -> usize {
    let (country, years) = {
      let inner = self.inner.lock();
      let (start, end) =
        visible_span(&inner.state);
      (
        inner.state.country.clone(),
        grid::years_spanned(start, end)
      )
    };
    self.notify(StateChange::Loading);

    let mut failures = 0;
    for year in years {
      if self
        .service
        .fetch_year_holidays(year, &country)
        .await
        .is_failed()
      {
        failures += 1;
      }
    }

    let mut inner = self.inner.lock();
    inner.changes.push(StateChange::Loading);
    inner.changes.push(StateChange::Holidays);
    if failures > 0 {
      inner.changes.push(StateChange::Error);
    }
    failures
  }

  /// Reloads the upcoming list. A failure
  /// keeps the previous list.
  #[instrument(skip(self))]
  pub async fn refresh_upcoming(
    &self
  ) -> FetchOutcome<Vec<HolidayRecord>> {
    let country =
      self.inner.lock().state.country.clone();
    self.notify(StateChange::Loading);
    let outcome = self
      .service
      .fetch_upcoming_holidays(&country)
      .await;

    let mut inner = self.inner.lock();
    inner.changes.push(StateChange::Loading);
    if inner.state.country != country {
      debug!(
        country = %country,
        "country changed during fetch; \
         dropping upcoming list"
      );
      return outcome;
    }
    match outcome.data() {
      | Some(list) => {
        inner.upcoming = Some(list.clone());
        inner.changes.push(StateChange::Upcoming);
      }
      | None => {
        inner.changes.push(StateChange::Error);
      }
    }
    outcome
  }

  /// Reloads the country list. A failure
  /// keeps an already populated list.
  #[instrument(skip(self))]
  pub async fn refresh_countries(
    &self
  ) -> FetchOutcome<Vec<Country>> {
    self.notify(StateChange::Loading);
    let outcome = self
      .service
      .fetch_available_countries()
      .await;

    let mut inner = self.inner.lock();
    inner.changes.push(StateChange::Loading);
    match outcome.data() {
      | Some(list) => {
        inner.countries = Some(list.clone());
        inner
          .changes
          .push(StateChange::Countries);
      }
      | None => {
        inner.changes.push(StateChange::Error);
      }
    }
    outcome
  }

  pub async fn retry_holidays(&self) -> usize {
    self.service.clear_error(FetchKind::Holidays);
    self.load_visible_holidays().await
  }

  pub async fn retry_upcoming(
    &self
  ) -> FetchOutcome<Vec<HolidayRecord>> {
    self.service.clear_error(FetchKind::Upcoming);
    self.refresh_upcoming().await
  }

  pub async fn retry_countries(
    &self
  ) -> FetchOutcome<Vec<Country>> {
    self
      .service
      .clear_error(FetchKind::Countries);
    self.refresh_countries().await
  }

  /// Searches holiday names around the shown
  /// year. A blank query closes the results.
  #[instrument(skip(self))]
  pub async fn search(
    &self,
    query: &str
  ) -> Vec<SearchResult> {
    let (country, center) = {
      let mut inner = self.inner.lock();
      inner.search = SearchState {
        query: query.trim().to_string(),
        results: Vec::new(),
        open: false
      };
      inner.changes.push(StateChange::Search);
      (
        inner.state.country.clone(),
        inner.state.year
      )
    };
    if query.trim().is_empty() {
      return Vec::new();
    }

    let results = search::search(
      &self.service,
      query,
      &country,
      center,
      self.settings.search_radius,
      Some(self.settings.year_range)
    )
    .await;

    let mut inner = self.inner.lock();
    if inner.search.query == query.trim()
      && inner.state.country == country
    {
      inner.search.results = results.clone();
      inner.search.open = true;
      inner.changes.push(StateChange::Search);
    }
    results
  }

  /// Results of the last search while the
  /// result list is open.
  pub fn search_matches(
    &self
  ) -> Vec<SearchResult> {
    let inner = self.inner.lock();
    if inner.search.open {
      inner.search.results.clone()
    } else {
      Vec::new()
    }
  }

  pub fn is_search_match(
    &self,
    date: NaiveDate
  ) -> bool {
    let inner = self.inner.lock();
    inner.search.open
      && inner
        .search
        .results
        .iter()
        .any(|r| r.date == date)
  }

  pub fn close_search(&self) {
    let mut inner = self.inner.lock();
    if inner.search.open {
      inner.search.open = false;
      inner.changes.push(StateChange::Search);
    }
  }

  fn check_year(
    &self,
    year: i32
  ) -> Result<(), ValidationError> {
    let range = self.settings.year_range;
    if range.contains(year) {
      Ok(())
    } else {
      Err(ValidationError::YearOutOfRange {
        year,
        min: range.min,
        max: range.max
      })
    }
  }

  fn notify(&self, change: StateChange) {
    self.inner.lock().changes.push(change);
  }

  fn save_current_view(&self) {
    let (view, selected) = {
      let inner = self.inner.lock();
      (
        inner.state.view,
        inner.state.selected_date
      )
    };
    prefs::save_view(self.prefs.as_ref(), view);
    prefs::save_selected_date(
      self.prefs.as_ref(),
      selected
    );
  }

  fn cached_years(
    &self,
    country: &str,
    start: NaiveDate,
    end: NaiveDate
  ) -> BTreeMap<i32, YearHolidayMap> {
    grid::years_spanned(start, end)
      .filter_map(|year| {
        self
          .service
          .cached_year_holidays(year, country)
          .map(|map| (year, map))
      })
      .collect()
  }
}

/// First and last day the current view
/// displays.
pub fn visible_span(
  state: &ViewState
) -> (NaiveDate, NaiveDate) {
  match state.view {
    | ViewMode::Month => {
      grid::month_grid_bounds(
        state.year,
        state.month,
        state.week_starts_on
      )
    }
    | ViewMode::Week => {
      let anchor = state
        .week_anchor
        .unwrap_or_else(|| {
          grid::start_of_week(
            state.focus_date(),
            state.week_starts_on
          )
        });
      (anchor, grid::add_days(anchor, 6))
    }
    | ViewMode::Year => {
      let (start, _) =
        grid::month_grid_bounds(
          state.year,
          1,
          state.week_starts_on
        );
      let (_, end) = grid::month_grid_bounds(
        state.year,
        12,
        state.week_starts_on
      );
      (start, end)
    }
  }
}

/// Accepts `YYYY-MM-DD` (or `/` separated).
pub fn parse_date_input(
  input: &str
) -> Result<NaiveDate, ValidationError> {
  let trimmed = input.trim();
  if trimmed.is_empty() {
    return Err(ValidationError::Empty);
  }

  let date_re = Regex::new(
    r"^(?P<year>\d{4})[-/](?P<month>\d{1,2})[-/](?P<day>\d{1,2})$"
  )
  .map_err(|e| {
    ValidationError::Unparsable(format!(
      "internal regex compile failure: {e}"
    ))
  })?;

  let unparsable = || {
    ValidationError::Unparsable(
      trimmed.to_string()
    )
  };
  let caps = date_re
    .captures(trimmed)
    .ok_or_else(unparsable)?;
  let field = |name: &str| {
    caps
      .name(name)
      .and_then(|m| {
        m.as_str().parse::<u32>().ok()
      })
      .ok_or_else(unparsable)
  };

  let year = i32::try_from(field("year")?)
    .map_err(|_| unparsable())?;
  NaiveDate::from_ymd_opt(
    year,
    field("month")?,
    field("day")?
  )
  .ok_or_else(unparsable)
}

fn restore_state(
  store: &dyn KeyValueStore,
  today: NaiveDate,
  settings: &ControllerSettings
) -> ViewState {
  let stored = prefs::load_preferences(store);
  let mut state = ViewState::new(
    today,
    stored
      .country
      .as_deref()
      .unwrap_or(&settings.default_country),
    stored
      .language
      .as_deref()
      .unwrap_or(&settings.default_language)
  );
  state.theme = stored
    .theme
    .unwrap_or(settings.default_theme);
  state.view =
    stored.view.unwrap_or(settings.default_view);
  state.week_starts_on = stored
    .week_starts_on
    .unwrap_or(settings.week_starts_on);

  let selected = match stored.selected_date {
    | Some(date)
      if settings
        .year_range
        .contains(date.year()) =>
    {
      date
    }
    | Some(date) => {
      warn!(
        %date,
        "stored date outside year range; \
         removing"
      );
      prefs::save_selected_date(store, None);
      today
    }
    | None => today
  };
  state.selected_date = Some(selected);
  state.year = selected.year();
  state.month = selected.month();
  if state.view == ViewMode::Week {
    state.week_anchor =
      Some(grid::start_of_week(
        selected,
        state.week_starts_on
      ));
  }
  state
}
