#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use holiday_core::api::{ApiResponse, HolidayApi};
use holiday_core::clock::FixedClock;
use holiday_core::config::YearRange;
use holiday_core::controller::{CalendarController, ControllerSettings};
use holiday_core::error::FetchError;
use holiday_core::grid::WeekStart;
use holiday_core::service::{CacheTtls, HolidayService};
use holiday_core::state::{Theme, ViewMode};
use holiday_core::store::MemoryStore;
use parking_lot::Mutex;

pub const DAY_MS: i64 = 86_400_000;

/// Scripted holiday API that records every request path.
/// Unrouted paths answer 404.
#[derive(Default)]
pub struct FakeApi {
    routes: Mutex<HashMap<String, Result<ApiResponse, FetchError>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.routes.lock().insert(
            path.to_string(),
            Ok(ApiResponse {
                status,
                body: body.to_string(),
            }),
        );
    }

    pub fn fail(&self, path: &str, error: FetchError) {
        self.routes.lock().insert(path.to_string(), Err(error));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|p| p.as_str() == path).count()
    }
}

impl HolidayApi for FakeApi {
    async fn get(&self, path: &str) -> Result<ApiResponse, FetchError> {
        self.calls.lock().push(path.to_string());
        self.routes.lock().get(path).cloned().unwrap_or(Ok(ApiResponse {
            status: 404,
            body: String::new(),
        }))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// One holiday in the upstream v3 wire shape.
pub fn api_holiday(date: &str, name: &str) -> String {
    format!(
        r#"{{"date":"{date}","localName":"{name}","name":"{name}","countryCode":"FR","fixed":true,"global":true,"counties":null,"launchYear":null,"types":["Public"]}}"#
    )
}

pub fn api_holidays(entries: &[(&str, &str)]) -> String {
    let items: Vec<String> = entries.iter().map(|(d, n)| api_holiday(d, n)).collect();
    format!("[{}]", items.join(","))
}

pub fn fr_2024() -> String {
    api_holidays(&[
        ("2024-01-01", "New Year's Day"),
        ("2024-05-01", "Labour Day"),
        ("2024-07-14", "Bastille Day"),
        ("2024-12-25", "Christmas Day"),
    ])
}

pub struct Fixture {
    pub api: Arc<FakeApi>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
}

impl Fixture {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            api: FakeApi::new(),
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(FixedClock::at_date(today)),
        }
    }

    pub fn service(&self) -> HolidayService<Arc<FakeApi>> {
        HolidayService::new(
            self.api.clone(),
            self.store.clone(),
            self.clock.clone(),
            CacheTtls::default(),
        )
    }

    pub fn settings(&self, year_range: YearRange) -> ControllerSettings {
        ControllerSettings {
            default_country: "FR".to_string(),
            default_language: "en".to_string(),
            default_theme: Theme::Light,
            default_view: ViewMode::Month,
            week_starts_on: WeekStart::Sunday,
            year_range,
            search_radius: 1,
        }
    }

    pub fn controller_with(&self, year_range: YearRange) -> CalendarController<Arc<FakeApi>> {
        CalendarController::new(
            self.service(),
            self.store.clone(),
            self.clock.clone(),
            self.settings(year_range),
        )
    }

    pub fn controller(&self) -> CalendarController<Arc<FakeApi>> {
        self.controller_with(YearRange { min: 1926, max: 2126 })
    }
}
