mod common;

use common::{Fixture, api_holidays, date, fr_2024};
use holiday_core::config::YearRange;
use holiday_core::controller::{CalendarView, Direction};
use holiday_core::error::{FetchOutcome, ValidationError};
use holiday_core::grid::WeekStart;
use holiday_core::service::FetchKind;
use holiday_core::state::{StateChange, Theme, ViewMode};
use holiday_core::store::KeyValueStore;

#[tokio::test]
async fn first_week_view_anchors_on_start_of_selected_week() {
    let fx = Fixture::new(date(2024, 1, 31));
    let controller = fx.controller();
    assert_eq!(controller.state().week_anchor, None);

    controller.switch_view(ViewMode::Week).await;

    let state = controller.state();
    assert_eq!(state.view, ViewMode::Week);
    assert_eq!(state.week_anchor, Some(date(2024, 1, 28)));
    match controller.current_view() {
        CalendarView::Week(cells) => {
            assert_eq!(cells.len(), 7);
            assert_eq!(cells[0].date, date(2024, 1, 28));
            assert!(cells[3].is_today && cells[3].is_selected);
        }
        other => panic!("expected week view, got {other:?}"),
    }
}

#[tokio::test]
async fn month_navigation_clamps_selected_day() {
    let fx = Fixture::new(date(2024, 1, 31));
    let controller = fx.controller();

    assert!(controller.navigate(Direction::Next).await);
    let state = controller.state();
    assert_eq!((state.year, state.month), (2024, 2));
    assert_eq!(state.selected_date, Some(date(2024, 2, 29)));

    controller.jump_to_date("2023-01-31").await.expect("jump");
    controller.navigate(Direction::Next).await;
    assert_eq!(controller.state().selected_date, Some(date(2023, 2, 28)));

    controller.navigate(Direction::Prev).await;
    controller.navigate(Direction::Prev).await;
    let state = controller.state();
    assert_eq!((state.year, state.month), (2022, 12));
    assert_eq!(state.selected_date, Some(date(2022, 12, 28)));
}

#[tokio::test]
async fn week_navigation_steps_seven_days_across_years() {
    let fx = Fixture::new(date(2024, 12, 20));
    let controller = fx.controller();
    controller.switch_view(ViewMode::Week).await;
    assert_eq!(controller.state().week_anchor, Some(date(2024, 12, 15)));

    controller.navigate(Direction::Next).await;
    controller.navigate(Direction::Next).await;
    let state = controller.state();
    assert_eq!(state.week_anchor, Some(date(2024, 12, 29)));
    assert_eq!(state.selected_date, Some(date(2025, 1, 3)));
    assert_eq!((state.year, state.month), (2024, 12));

    let calls = fx.api.calls();
    assert!(calls.contains(&"PublicHolidays/2024/FR".to_string()));
    assert!(calls.contains(&"PublicHolidays/2025/FR".to_string()));
}

#[tokio::test]
async fn week_navigation_resumes_after_restart() {
    let fx = Fixture::new(date(2024, 6, 12));
    {
        let controller = fx.controller();
        controller.switch_view(ViewMode::Week).await;
        assert_eq!(controller.state().week_anchor, Some(date(2024, 6, 9)));
        assert!(controller.navigate(Direction::Next).await);
        let state = controller.state();
        assert_eq!(state.week_anchor, Some(date(2024, 6, 16)));
        assert_eq!(state.selected_date, Some(date(2024, 6, 19)));
    }

    let controller = fx.controller();
    assert_eq!(controller.state().view, ViewMode::Week);
    assert_eq!(controller.state().week_anchor, Some(date(2024, 6, 16)));

    assert!(controller.navigate(Direction::Next).await);
    assert_eq!(controller.state().week_anchor, Some(date(2024, 6, 23)));
    assert!(controller.navigate(Direction::Prev).await);
    assert!(controller.navigate(Direction::Prev).await);
    let state = controller.state();
    assert_eq!(state.week_anchor, Some(date(2024, 6, 9)));
    assert_eq!(state.selected_date, Some(date(2024, 6, 12)));
}

#[tokio::test]
async fn year_navigation_stops_at_range_without_changes() {
    let fx = Fixture::new(date(2024, 6, 15));
    let controller = fx.controller_with(YearRange { min: 2023, max: 2024 });
    controller.switch_view(ViewMode::Year).await;
    controller.take_changes();

    assert!(!controller.navigate(Direction::Next).await);
    assert_eq!(controller.state().year, 2024);
    assert!(controller.take_changes().is_empty());
    assert!(!controller.render_pending());

    assert!(controller.navigate(Direction::Prev).await);
    let state = controller.state();
    assert_eq!(state.year, 2023);
    assert_eq!(state.selected_date, Some(date(2023, 6, 15)));
    assert!(!controller.navigate(Direction::Prev).await);
}

#[tokio::test]
async fn jump_to_date_validates_without_mutating() {
    let fx = Fixture::new(date(2024, 1, 31));
    let controller = fx.controller();
    controller.switch_view(ViewMode::Week).await;
    let before = controller.state();

    assert_eq!(
        controller.jump_to_date("1800-01-01").await,
        Err(ValidationError::YearOutOfRange {
            year: 1800,
            min: 1926,
            max: 2126,
        })
    );
    assert!(matches!(
        controller.jump_to_date("31/12/2024").await,
        Err(ValidationError::Unparsable(_))
    ));
    assert_eq!(
        controller.jump_to_date("   ").await,
        Err(ValidationError::Empty)
    );
    assert_eq!(controller.state(), before);

    let landed = controller.jump_to_date("2024-12-25").await.expect("jump");
    assert_eq!(landed, date(2024, 12, 25));
    let state = controller.state();
    assert_eq!(state.view, ViewMode::Month);
    assert_eq!((state.year, state.month), (2024, 12));
    assert_eq!(state.selected_date, Some(landed));
}

#[tokio::test]
async fn selecting_in_year_view_opens_month() {
    let fx = Fixture::new(date(2024, 1, 31));
    let controller = fx.controller();
    controller.switch_view(ViewMode::Year).await;

    controller.select_date(date(2024, 8, 15)).await.expect("select");

    let state = controller.state();
    assert_eq!(state.view, ViewMode::Month);
    assert_eq!((state.year, state.month), (2024, 8));
    assert_eq!(state.selected_date, Some(date(2024, 8, 15)));
}

#[tokio::test]
async fn selecting_outside_visible_month_moves_period() {
    let fx = Fixture::new(date(2024, 1, 31));
    let controller = fx.controller();
    controller.take_changes();

    controller.select_date(date(2024, 1, 10)).await.expect("select");
    assert_eq!(controller.take_changes(), vec![StateChange::Selection]);

    controller.select_date(date(2024, 3, 5)).await.expect("select");
    let state = controller.state();
    assert_eq!((state.year, state.month), (2024, 3));
    let changes = controller.take_changes();
    assert!(changes.contains(&StateChange::Period));
    assert!(changes.contains(&StateChange::Holidays));
}

#[tokio::test]
async fn grid_straddling_new_year_shows_both_years() {
    let fx = Fixture::new(date(2024, 12, 1));
    fx.api.respond("PublicHolidays/2024/FR", 200, &fr_2024());
    fx.api.respond(
        "PublicHolidays/2025/FR",
        200,
        &api_holidays(&[("2025-01-01", "New Year's Day")]),
    );
    let controller = fx.controller();

    controller.jump_to_date("2024-12-31").await.expect("jump");
    controller.switch_view(ViewMode::Week).await;

    match controller.current_view() {
        CalendarView::Week(cells) => {
            assert_eq!(cells[0].date, date(2024, 12, 29));
            assert_eq!(
                cells[3].holiday.as_ref().map(|h| h.name.as_str()),
                Some("New Year's Day")
            );
        }
        other => panic!("expected week view, got {other:?}"),
    }

    controller.switch_view(ViewMode::Month).await;
    match controller.current_view() {
        CalendarView::Month(month) => {
            let christmas = month
                .cells
                .iter()
                .find(|c| c.date == date(2024, 12, 25))
                .expect("christmas cell");
            assert!(christmas.holiday.is_some());
            let trailing = month.cells.last().expect("last cell");
            assert!(!trailing.is_current_period);
            assert_eq!(trailing.date, date(2025, 1, 4));
        }
        other => panic!("expected month view, got {other:?}"),
    }
}

#[tokio::test]
async fn country_change_keeps_period_and_reloads() {
    let fx = Fixture::new(date(2024, 7, 10));
    let controller = fx.controller();
    controller.load_visible_holidays().await;

    controller.set_country(" de ").await;

    let state = controller.state();
    assert_eq!(state.country, "DE");
    assert_eq!((state.year, state.month), (2024, 7));
    assert_eq!(fx.api.call_count("PublicHolidays/2024/DE"), 1);
    assert_eq!(fx.api.call_count("NextPublicHolidays/DE"), 1);
    assert_eq!(
        fx.store.get("calendarCountry").expect("read").as_deref(),
        Some("DE")
    );

    controller.set_language("fr");
    assert_eq!(controller.state().language, "fr");
    assert_eq!((controller.state().year, controller.state().month), (2024, 7));
}

#[tokio::test]
async fn failed_upcoming_refresh_keeps_last_good_list() {
    let fx = Fixture::new(date(2024, 3, 1));
    fx.api.respond(
        "NextPublicHolidays/FR",
        200,
        &api_holidays(&[("2024-04-01", "Easter Monday")]),
    );
    let controller = fx.controller();

    controller.refresh_upcoming().await;
    assert_eq!(controller.upcoming().map(|l| l.len()), Some(1));

    controller.service().invalidate_upcoming("FR");
    fx.api.respond("NextPublicHolidays/FR", 500, "");
    let outcome = controller.retry_upcoming().await;

    assert!(outcome.is_failed());
    assert_eq!(controller.upcoming().map(|l| l.len()), Some(1));
    assert!(controller.last_error(FetchKind::Upcoming).is_some());
    assert!(!controller.is_loading(FetchKind::Upcoming));
}

#[tokio::test]
async fn failed_country_list_keeps_populated_selector() {
    let fx = Fixture::new(date(2024, 3, 1));
    fx.api.respond(
        "AvailableCountries",
        200,
        r#"[{"countryCode":"FR","name":"France"}]"#,
    );
    let controller = fx.controller();
    controller.refresh_countries().await;

    controller.service().invalidate_countries();
    fx.api.respond("AvailableCountries", 502, "");
    assert!(controller.retry_countries().await.is_failed());
    assert_eq!(controller.countries().map(|l| l.len()), Some(1));
}

#[tokio::test]
async fn month_and_year_setters_clamp_the_day() {
    let fx = Fixture::new(date(2024, 1, 31));
    let controller = fx.controller();

    controller.set_month(2).await.expect("set month");
    assert_eq!(controller.state().selected_date, Some(date(2024, 2, 29)));

    controller.set_year(2023).await.expect("set year");
    let state = controller.state();
    assert_eq!(state.selected_date, Some(date(2023, 2, 28)));
    assert_eq!((state.year, state.month), (2023, 2));

    assert!(controller.set_month(13).await.is_err());
    assert!(matches!(
        controller.set_year(3000).await,
        Err(ValidationError::YearOutOfRange { .. })
    ));
}

#[tokio::test]
async fn preferences_survive_a_restart() {
    let fx = Fixture::new(date(2024, 1, 31));
    {
        let controller = fx.controller();
        controller.set_theme(Theme::Dark);
        controller.set_week_starts_on(WeekStart::Monday).await;
        controller.jump_to_date("2024-05-08").await.expect("jump");
        controller.switch_view(ViewMode::Week).await;
    }

    let restored = fx.controller().state();
    assert_eq!(restored.theme, Theme::Dark);
    assert_eq!(restored.week_starts_on, WeekStart::Monday);
    assert_eq!(restored.view, ViewMode::Week);
    assert_eq!(restored.selected_date, Some(date(2024, 5, 8)));
    assert_eq!((restored.year, restored.month), (2024, 5));
    assert_eq!(restored.week_anchor, Some(date(2024, 5, 6)));
}

#[tokio::test]
async fn stored_date_outside_range_is_dropped() {
    let fx = Fixture::new(date(2024, 1, 31));
    fx.store
        .set("calendarSelectedDate", "1700-01-01")
        .expect("seed");

    let state = fx.controller().state();
    assert_eq!(state.selected_date, Some(date(2024, 1, 31)));
    assert_eq!(fx.store.get("calendarSelectedDate").expect("read"), None);
}

#[tokio::test]
async fn start_loads_everything_and_clears_loading_flags() {
    let fx = Fixture::new(date(2024, 3, 1));
    fx.api.respond("PublicHolidays/2024/FR", 200, &fr_2024());
    fx.api.respond("NextPublicHolidays/FR", 204, "");
    fx.api.respond(
        "AvailableCountries",
        200,
        r#"[{"countryCode":"FR","name":"France"}]"#,
    );
    let controller = fx.controller();

    controller.start().await;

    assert!(!controller.service().status().is_any_loading());
    assert_eq!(controller.upcoming(), Some(Vec::new()));
    assert_eq!(controller.countries().map(|l| l.len()), Some(1));
    assert!(controller.render_pending());

    let changes = controller.take_changes();
    assert!(changes.contains(&StateChange::Holidays));
    assert!(changes.contains(&StateChange::Upcoming));
    assert!(changes.contains(&StateChange::Countries));
    assert!(changes.contains(&StateChange::Loading));
    assert!(!changes.contains(&StateChange::Error));
    assert!(!controller.render_pending());
}

#[tokio::test]
async fn failed_fetch_still_reports_loading_transitions() {
    let fx = Fixture::new(date(2024, 3, 1));
    fx.api.respond("AvailableCountries", 503, "");
    let controller = fx.controller();
    controller.take_changes();

    assert!(controller.refresh_countries().await.is_failed());

    assert!(!controller.is_loading(FetchKind::Countries));
    let changes = controller.take_changes();
    assert!(changes.contains(&StateChange::Loading));
    assert!(changes.contains(&StateChange::Error));
}

#[tokio::test]
async fn day_info_reads_cached_holiday() {
    let fx = Fixture::new(date(2024, 7, 1));
    fx.api.respond("PublicHolidays/2024/FR", 200, &fr_2024());
    let controller = fx.controller();
    controller.load_visible_holidays().await;

    let info = controller.day_info(date(2024, 7, 14));
    assert!(!info.is_today);
    assert_eq!(info.iso_week, 28);
    assert_eq!(
        info.holiday.map(|h| h.name),
        Some("Bastille Day".to_string())
    );

    let today = controller.selected_day_info().expect("selection");
    assert!(today.is_today);
    assert_eq!(today.holiday, None);
}

#[tokio::test]
async fn search_results_follow_open_and_close() {
    let fx = Fixture::new(date(2024, 1, 31));
    fx.api.respond("PublicHolidays/2023/FR", 500, "");
    fx.api.respond("PublicHolidays/2024/FR", 200, &fr_2024());
    fx.api.respond(
        "PublicHolidays/2025/FR",
        200,
        &api_holidays(&[("2025-12-25", "Christmas Day")]),
    );
    let controller = fx.controller();

    let results = controller.search("CHRISTMAS").await;
    let dates: Vec<_> = results.iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![date(2024, 12, 25), date(2025, 12, 25)]);
    assert_eq!(results[1].source_year, 2025);
    assert!(controller.is_search_match(date(2024, 12, 25)));
    assert_eq!(controller.search_matches().len(), 2);

    controller.close_search();
    assert!(controller.search_matches().is_empty());
    assert!(!controller.is_search_match(date(2024, 12, 25)));

    let calls_before = fx.api.calls().len();
    assert!(controller.search("   ").await.is_empty());
    assert_eq!(fx.api.calls().len(), calls_before);
}

#[tokio::test]
async fn week_start_change_updates_headers_and_anchor() {
    let fx = Fixture::new(date(2024, 1, 31));
    let controller = fx.controller();
    assert_eq!(controller.weekday_headers()[0], "Sun");
    controller.switch_view(ViewMode::Week).await;

    controller.set_week_starts_on(WeekStart::Monday).await;

    assert_eq!(controller.weekday_headers()[0], "Mon");
    assert_eq!(controller.state().week_anchor, Some(date(2024, 1, 29)));
    assert_eq!(
        fx.store.get("calendarWeekStart").expect("read").as_deref(),
        Some("monday")
    );
}

#[tokio::test]
async fn failed_year_still_renders_grid() {
    let fx = Fixture::new(date(2024, 3, 1));
    fx.api.respond("PublicHolidays/2024/FR", 500, "");
    let controller = fx.controller();

    assert_eq!(controller.load_visible_holidays().await, 1);
    assert!(controller.take_changes().contains(&StateChange::Error));
    match controller.current_view() {
        CalendarView::Month(month) => {
            assert_eq!(month.cells.len() % 7, 0);
            assert!(month.cells.iter().all(|c| c.holiday.is_none()));
        }
        other => panic!("expected month view, got {other:?}"),
    }

    fx.api.respond("PublicHolidays/2024/FR", 200, &fr_2024());
    assert_eq!(controller.retry_holidays().await, 0);
    assert_eq!(controller.last_error(FetchKind::Holidays), None);
    assert!(matches!(
        controller.service().fetch_year_holidays(2024, "FR").await,
        FetchOutcome::Loaded(_)
    ));
}
