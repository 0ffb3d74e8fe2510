use std::io::{self, Write};

use anyhow::{Context, anyhow};
use tracing::{debug, instrument, warn};

use crate::api::HolidayApi;
use crate::controller::{CalendarController, Direction, parse_date_input, visible_span};
use crate::grid::{self, CalendarCell, WeekStart};
use crate::render::Renderer;
use crate::service::FetchKind;
use crate::state::{Theme, ViewMode};

/// Parsed command line action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    Month(Option<(i32, u32)>),
    Week(Option<String>),
    Year(Option<i32>),
    Day(Option<String>),
    Upcoming,
    Countries,
    Search(String),
    Country(String),
    Lang(String),
    Theme(Theme),
    View(ViewMode),
    WeekStart(WeekStart),
    Today,
    Next,
    Prev,
    Jump(String),
    ClearCache,
    Status,
}

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "month",
        "week",
        "year",
        "day",
        "upcoming",
        "countries",
        "search",
        "country",
        "lang",
        "theme",
        "view",
        "week-start",
        "today",
        "next",
        "prev",
        "jump",
        "clear-cache",
        "status",
    ]
}

/// Exact name, or the single command that
/// starts with `token`.
pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

impl Command {
    #[instrument]
    pub fn parse(tokens: &[String]) -> anyhow::Result<Self> {
        let Some((head, args)) = tokens.split_first() else {
            return Ok(Self::Show);
        };

        let lowered = head.to_ascii_lowercase();
        let known = known_command_names();
        let name = expand_command_abbrev(&lowered, &known)
            .ok_or_else(|| anyhow!("unknown or ambiguous command: {head}"))?;
        debug!(command = name, ?args, "resolved command");

        let first = args.first().map(String::as_str);
        let required = |what: &str| first.ok_or_else(|| anyhow!("{name} needs {what}"));

        let command = match name {
            "month" => Self::Month(first.map(parse_year_month).transpose()?),
            "week" => Self::Week(first.map(str::to_string)),
            "year" => Self::Year(
                first
                    .map(|raw| {
                        raw.trim()
                            .parse::<i32>()
                            .with_context(|| format!("invalid year: {raw}"))
                    })
                    .transpose()?,
            ),
            "day" => Self::Day(first.map(str::to_string)),
            "upcoming" => Self::Upcoming,
            "countries" => Self::Countries,
            "search" => {
                let query = args.join(" ");
                if query.trim().is_empty() {
                    return Err(anyhow!("search needs a query"));
                }
                Self::Search(query)
            }
            "country" => Self::Country(required("a country code")?.to_string()),
            "lang" => Self::Lang(required("a language code")?.to_string()),
            "theme" => {
                let raw = required("light or dark")?;
                Self::Theme(Theme::from_key(raw).ok_or_else(|| anyhow!("invalid theme: {raw}"))?)
            }
            "view" => {
                let raw = required("month, week or year")?;
                Self::View(ViewMode::from_key(raw).ok_or_else(|| anyhow!("invalid view: {raw}"))?)
            }
            "week-start" => {
                let raw = required("sunday or monday")?;
                Self::WeekStart(WeekStart::from_key(raw).ok_or_else(|| anyhow!("invalid week start: {raw}"))?)
            }
            "today" => Self::Today,
            "next" => Self::Next,
            "prev" => Self::Prev,
            "jump" => Self::Jump(required("a date (YYYY-MM-DD)")?.to_string()),
            "clear-cache" => Self::ClearCache,
            "status" => Self::Status,
            other => return Err(anyhow!("unhandled command: {other}")),
        };
        Ok(command)
    }
}

fn parse_year_month(raw: &str) -> anyhow::Result<(i32, u32)> {
    let (year, month) = raw
        .trim()
        .split_once('-')
        .ok_or_else(|| anyhow!("expected YYYY-MM, got: {raw}"))?;
    let year = year.parse::<i32>().with_context(|| format!("invalid year in {raw}"))?;
    let month = month.parse::<u32>().with_context(|| format!("invalid month in {raw}"))?;
    if !(1..=12).contains(&month) {
        return Err(anyhow!("month must be 1-12, got {month}"));
    }
    Ok((year, month))
}

pub async fn dispatch<A: HolidayApi>(
    controller: &CalendarController<A>,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    dispatch_to(&mut out, controller, renderer, command).await
}

/// Runs `command` and writes its output to `out`. Rejected input is
/// returned as the error, not written.
#[instrument(skip(out, controller, renderer))]
pub async fn dispatch_to<W: Write, A: HolidayApi>(
    out: &mut W,
    controller: &CalendarController<A>,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Show => {
            controller.load_visible_holidays().await;
            print_view(out, controller, renderer)?;
        }
        Command::Month(target) => {
            controller.switch_view(ViewMode::Month).await;
            if let Some((year, month)) = target {
                controller.open_month(year, month).await?;
            }
            print_view(out, controller, renderer)?;
        }
        Command::Week(target) => {
            controller.switch_view(ViewMode::Week).await;
            if let Some(raw) = target {
                controller.select_date(parse_date_input(&raw)?).await?;
            }
            print_view(out, controller, renderer)?;
        }
        Command::Year(target) => {
            controller.switch_view(ViewMode::Year).await;
            if let Some(year) = target {
                controller.set_year(year).await?;
            }
            print_view(out, controller, renderer)?;
        }
        Command::Day(target) => {
            match target {
                Some(raw) => controller.select_date(parse_date_input(&raw)?).await?,
                None => {
                    controller.load_visible_holidays().await;
                }
            }
            if let Some(info) = controller.selected_day_info() {
                renderer.write_day_info(out, &info)?;
            }
        }
        Command::Upcoming => {
            controller.refresh_upcoming().await;
            match controller.upcoming() {
                Some(list) if list.is_empty() => writeln!(out, "no upcoming holidays")?,
                Some(list) => renderer.write_holidays(out, &list)?,
                None => {}
            }
        }
        Command::Countries => {
            controller.refresh_countries().await;
            if let Some(list) = controller.countries() {
                renderer.write_countries(out, &list)?;
            }
        }
        Command::Search(query) => {
            let results = controller.search(&query).await;
            renderer.write_search(out, &query, &results)?;
        }
        Command::Country(code) => {
            controller.set_country(&code).await;
            renderer.write_status(out, &controller.state())?;
        }
        Command::Lang(lang) => {
            controller.set_language(&lang);
            renderer.write_status(out, &controller.state())?;
        }
        Command::Theme(theme) => {
            controller.set_theme(theme);
            renderer.write_status(out, &controller.state())?;
        }
        Command::View(view) => {
            controller.switch_view(view).await;
            print_view(out, controller, renderer)?;
        }
        Command::WeekStart(week_start) => {
            controller.set_week_starts_on(week_start).await;
            print_view(out, controller, renderer)?;
        }
        Command::Today => {
            controller.jump_to_today().await;
            print_view(out, controller, renderer)?;
        }
        Command::Next | Command::Prev => {
            let direction = if command == Command::Next {
                Direction::Next
            } else {
                Direction::Prev
            };
            if !controller.navigate(direction).await {
                let range = controller.year_range();
                warn!(min = range.min, max = range.max, "navigation stopped at year range");
                writeln!(out, "already at the edge of {}-{}", range.min, range.max)?;
            }
            print_view(out, controller, renderer)?;
        }
        Command::Jump(raw) => {
            controller
                .jump_to_date(&raw)
                .await
                .with_context(|| format!("cannot jump to {raw}"))?;
            print_view(out, controller, renderer)?;
        }
        Command::ClearCache => {
            let state = controller.state();
            let (start, end) = visible_span(&state);
            let service = controller.service();
            for year in grid::years_spanned(start, end) {
                service.invalidate_year(year, &state.country);
            }
            service.invalidate_upcoming(&state.country);
            service.invalidate_countries();
            writeln!(out, "cleared cached data for {}", state.country)?;
        }
        Command::Status => {
            renderer.write_status(out, &controller.state())?;
        }
    }

    report_errors(out, controller, renderer)?;
    let changes = controller.take_changes();
    debug!(?changes, "state changes this run");
    Ok(())
}

fn print_view<W: Write, A: HolidayApi>(
    out: &mut W,
    controller: &CalendarController<A>,
    renderer: &Renderer,
) -> anyhow::Result<()> {
    let view = controller.current_view();
    let highlight = |cell: &CalendarCell| controller.is_search_match(cell.date);
    renderer.write_view(out, &view, &highlight)
}

fn report_errors<W: Write, A: HolidayApi>(
    out: &mut W,
    controller: &CalendarController<A>,
    renderer: &Renderer,
) -> anyhow::Result<()> {
    for (kind, label) in [
        (FetchKind::Holidays, "holidays"),
        (FetchKind::Upcoming, "upcoming holidays"),
        (FetchKind::Countries, "country list"),
    ] {
        if let Some(err) = controller.last_error(kind) {
            renderer.write_error(out, &format!("{label} unavailable: {err} (run again to retry)"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn abbreviations_resolve_when_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("up", &known), Some("upcoming"));
        assert_eq!(expand_command_abbrev("ne", &known), Some("next"));
        assert_eq!(expand_command_abbrev("week", &known), Some("week"));
        assert_eq!(expand_command_abbrev("c", &known), None);
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(Command::parse(&[]).expect("parse"), Command::Show);
        assert_eq!(
            Command::parse(&tokens(&["month", "2024-02"])).expect("parse"),
            Command::Month(Some((2024, 2)))
        );
        assert_eq!(
            Command::parse(&tokens(&["sea", "new", "year"])).expect("parse"),
            Command::Search("new year".to_string())
        );
        assert_eq!(
            Command::parse(&tokens(&["week-start", "mon"])).expect("parse"),
            Command::WeekStart(WeekStart::Monday)
        );
        assert_eq!(
            Command::parse(&tokens(&["theme", "dark"])).expect("parse"),
            Command::Theme(Theme::Dark)
        );
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(Command::parse(&tokens(&["month", "2024-13"])).is_err());
        assert!(Command::parse(&tokens(&["jump"])).is_err());
        assert!(Command::parse(&tokens(&["search", "  "])).is_err());
        assert!(Command::parse(&tokens(&["frobnicate"])).is_err());
    }
}
