use chrono::NaiveDate;
use tracing::{
  debug,
  warn
};

use crate::grid::WeekStart;
use crate::state::{
  Theme,
  ViewMode
};
use crate::store::KeyValueStore;

pub const SELECTED_DATE_STORAGE_KEY: &str =
  "calendarSelectedDate";
pub const COUNTRY_STORAGE_KEY: &str =
  "calendarCountry";
pub const LANGUAGE_STORAGE_KEY: &str =
  "calendarLang";
pub const THEME_STORAGE_KEY: &str =
  "calendarTheme";
pub const VIEW_STORAGE_KEY: &str =
  "calendarView";
pub const WEEK_START_STORAGE_KEY: &str =
  "calendarWeekStart";

/// Stored UI preferences. Absent or
/// unreadable values are `None`.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct Preferences {
  pub selected_date:  Option<NaiveDate>,
  pub country:        Option<String>,
  pub language:       Option<String>,
  pub theme:          Option<Theme>,
  pub view:           Option<ViewMode>,
  pub week_starts_on: Option<WeekStart>
}

fn load_raw(
  store: &dyn KeyValueStore,
  key: &str
) -> Option<String> {
  match store.get(key) {
    | Ok(value) => {
      value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
    }
    | Err(err) => {
      warn!(key, error = %err, "failed reading preference");
      None
    }
  }
}

fn save_raw(
  store: &dyn KeyValueStore,
  key: &str,
  value: &str
) {
  if let Err(err) = store.set(key, value) {
    warn!(key, error = %err, "failed saving preference");
  }
}

fn remove_raw(
  store: &dyn KeyValueStore,
  key: &str
) {
  if let Err(err) = store.remove(key) {
    warn!(key, error = %err, "failed removing preference");
  }
}

/// Reads every stored preference. A stored
/// date that does not parse is deleted.
pub fn load_preferences(
  store: &dyn KeyValueStore
) -> Preferences {
  let selected_date = load_raw(
    store,
    SELECTED_DATE_STORAGE_KEY
  )
  .and_then(|raw| {
    match NaiveDate::parse_from_str(
      &raw, "%Y-%m-%d"
    ) {
      | Ok(date) => Some(date),
      | Err(err) => {
        warn!(
          value = %raw,
          error = %err,
          "invalid stored date; removing"
        );
        remove_raw(
          store,
          SELECTED_DATE_STORAGE_KEY
        );
        None
      }
    }
  });

  let prefs = Preferences {
    selected_date,
    country: load_raw(
      store,
      COUNTRY_STORAGE_KEY
    )
    .map(|raw| raw.to_ascii_uppercase()),
    language: load_raw(
      store,
      LANGUAGE_STORAGE_KEY
    ),
    theme: load_raw(
      store,
      THEME_STORAGE_KEY
    )
    .as_deref()
    .and_then(Theme::from_key),
    view: load_raw(store, VIEW_STORAGE_KEY)
      .as_deref()
      .and_then(ViewMode::from_key),
    week_starts_on: load_raw(
      store,
      WEEK_START_STORAGE_KEY
    )
    .as_deref()
    .and_then(WeekStart::from_key)
  };
  debug!(?prefs, "loaded preferences");
  prefs
}

pub fn save_selected_date(
  store: &dyn KeyValueStore,
  date: Option<NaiveDate>
) {
  match date {
    | Some(date) => {
      save_raw(
        store,
        SELECTED_DATE_STORAGE_KEY,
        &date.format("%Y-%m-%d").to_string()
      );
    }
    | None => {
      remove_raw(
        store,
        SELECTED_DATE_STORAGE_KEY
      );
    }
  }
}

pub fn save_country(
  store: &dyn KeyValueStore,
  country: &str
) {
  save_raw(
    store,
    COUNTRY_STORAGE_KEY,
    country
  );
}

pub fn save_language(
  store: &dyn KeyValueStore,
  language: &str
) {
  save_raw(
    store,
    LANGUAGE_STORAGE_KEY,
    language
  );
}

pub fn save_theme(
  store: &dyn KeyValueStore,
  theme: Theme
) {
  save_raw(
    store,
    THEME_STORAGE_KEY,
    theme.as_key()
  );
}

pub fn save_view(
  store: &dyn KeyValueStore,
  view: ViewMode
) {
  save_raw(
    store,
    VIEW_STORAGE_KEY,
    view.as_key()
  );
}

pub fn save_week_start(
  store: &dyn KeyValueStore,
  week_start: WeekStart
) {
  save_raw(
    store,
    WEEK_START_STORAGE_KEY,
    week_start.as_key()
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;

  #[test]
  fn saved_values_load_back() {
    let store = MemoryStore::new();
    let date =
      NaiveDate::from_ymd_opt(2024, 7, 14)
        .expect("valid date");
    save_selected_date(&store, Some(date));
    save_country(&store, "de");
    save_language(&store, "fr");
    save_theme(&store, Theme::Dark);
    save_view(&store, ViewMode::Year);
    save_week_start(
      &store,
      WeekStart::Monday
    );

    let prefs = load_preferences(&store);
    assert_eq!(prefs.selected_date, Some(date));
    assert_eq!(
      prefs.country.as_deref(),
      Some("DE")
    );
    assert_eq!(
      prefs.language.as_deref(),
      Some("fr")
    );
    assert_eq!(prefs.theme, Some(Theme::Dark));
    assert_eq!(
      prefs.view,
      Some(ViewMode::Year)
    );
    assert_eq!(
      prefs.week_starts_on,
      Some(WeekStart::Monday)
    );
  }

  #[test]
  fn invalid_stored_date_is_removed() {
    let store = MemoryStore::new();
    store
      .set(
        SELECTED_DATE_STORAGE_KEY,
        "2024-02-30"
      )
      .expect("seed");
    store
      .set(VIEW_STORAGE_KEY, "agenda")
      .expect("seed");

    let prefs = load_preferences(&store);
    assert_eq!(prefs.selected_date, None);
    assert_eq!(prefs.view, None);
    assert_eq!(
      store
        .get(SELECTED_DATE_STORAGE_KEY)
        .expect("read"),
      None
    );
  }

  #[test]
  fn clearing_selection_removes_key() {
    let store = MemoryStore::new();
    let date =
      NaiveDate::from_ymd_opt(2024, 1, 1)
        .expect("valid date");
    save_selected_date(&store, Some(date));
    save_selected_date(&store, None);
    assert!(store.is_empty());
  }
}
