use std::io::{IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::controller::{CalendarView, DayInfo};
use crate::grid::{self, CalendarCell, MonthGrid, WeekStart};
use crate::model::{Country, HolidayRecord, HolidayScope};
use crate::search::SearchResult;
use crate::state::ViewState;

const DIM: &str = "2";
const INVERSE: &str = "7";
const UNDERLINE: &str = "4";
const RED: &str = "31";
const YELLOW: &str = "33";
const CYAN: &str = "36";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Colour is used only when enabled and
    /// stdout is a terminal.
    pub fn new(color: bool) -> Self {
        Self {
            color: color && std::io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn write_view<W: Write>(
        &self,
        out: &mut W,
        view: &CalendarView,
        highlight: &dyn Fn(&CalendarCell) -> bool,
    ) -> anyhow::Result<()> {
        match view {
            CalendarView::Month(month) => self.write_month(out, month, highlight),
            CalendarView::Week(cells) => self.write_week(out, cells),
            CalendarView::Year(months) => self.write_year(out, months),
        }
    }

    #[tracing::instrument(skip_all, fields(year = month.year, month = month.month))]
    pub fn write_month<W: Write>(
        &self,
        out: &mut W,
        month: &MonthGrid,
        highlight: &dyn Fn(&CalendarCell) -> bool,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&month_title(month.year, month.month), CYAN))?;

        let mut headers = vec!["Wk".to_string()];
        headers.extend(weekday_headers(month.week_start));

        let rows = month
            .rows()
            .zip(month.week_numbers())
            .map(|(row, week)| {
                let mut cells = vec![self.paint(&week.to_string(), DIM)];
                cells.extend(row.iter().map(|cell| self.day_cell(cell, highlight(cell))));
                cells
            })
            .collect();
        write_table(&mut *out, headers, rows)?;

        let holidays: Vec<HolidayRecord> = month
            .cells
            .iter()
            .filter(|cell| cell.is_current_period)
            .filter_map(|cell| cell.holiday.clone())
            .collect();
        if !holidays.is_empty() {
            writeln!(out)?;
            for holiday in &holidays {
                writeln!(
                    out,
                    "  {} {}",
                    self.paint(&holiday.date.format("%d").to_string(), RED),
                    display_name(holiday)
                )?;
            }
        }
        Ok(())
    }

    pub fn write_week<W: Write>(&self, out: &mut W, cells: &[CalendarCell]) -> anyhow::Result<()> {
        if let Some(first) = cells.first() {
            writeln!(
                out,
                "{}",
                self.paint(
                    &format!(
                        "Week {} ({})",
                        grid::iso_week_number(first.date),
                        first.date.format("%Y")
                    ),
                    CYAN
                )
            )?;
        }

        let headers = vec!["Date".to_string(), "Day".to_string(), "Holiday".to_string()];
        let rows = cells
            .iter()
            .map(|cell| {
                let date = cell.date.format("%Y-%m-%d").to_string();
                let date = if cell.is_today {
                    self.paint(&date, INVERSE)
                } else if cell.is_selected {
                    self.paint(&date, UNDERLINE)
                } else {
                    date
                };
                let day = cell.date.format("%a").to_string();
                let day = if cell.is_weekend { self.paint(&day, DIM) } else { day };
                let holiday = cell
                    .holiday
                    .as_ref()
                    .map(|h| self.paint(&display_name(h), RED))
                    .unwrap_or_default();
                vec![date, day, holiday]
            })
            .collect();
        write_table(out, headers, rows)
    }

    pub fn write_year<W: Write>(&self, out: &mut W, months: &[MonthGrid]) -> anyhow::Result<()> {
        for (idx, month) in months.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            let headers = weekday_headers(month.week_start);
            writeln!(out, "{}", self.paint(&month_title(month.year, month.month), CYAN))?;
            let rows = month
                .rows()
                .map(|row| {
                    row.iter()
                        .map(|cell| {
                            if cell.is_current_period {
                                self.day_cell(cell, false)
                            } else {
                                String::new()
                            }
                        })
                        .collect()
                })
                .collect();
            write_table(&mut *out, headers, rows)?;
        }
        Ok(())
    }

    pub fn write_holidays<W: Write>(&self, out: &mut W, holidays: &[HolidayRecord]) -> anyhow::Result<()> {
        let headers = vec![
            "Date".to_string(),
            "Name".to_string(),
            "Local name".to_string(),
            "Type".to_string(),
            "Scope".to_string(),
        ];
        let rows = holidays
            .iter()
            .map(|holiday| {
                vec![
                    self.paint(&holiday.date.format("%Y-%m-%d").to_string(), YELLOW),
                    holiday.name.clone(),
                    holiday.local_name.clone().unwrap_or_default(),
                    holiday.kind.to_string(),
                    scope_label(holiday),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    pub fn write_countries<W: Write>(&self, out: &mut W, countries: &[Country]) -> anyhow::Result<()> {
        let headers = vec!["Code".to_string(), "Name".to_string()];
        let rows = countries
            .iter()
            .map(|country| vec![self.paint(&country.code, YELLOW), country.name.clone()])
            .collect();
        write_table(out, headers, rows)
    }

    pub fn write_search<W: Write>(
        &self,
        out: &mut W,
        query: &str,
        results: &[SearchResult],
    ) -> anyhow::Result<()> {
        if results.is_empty() {
            writeln!(out, "no holidays match \"{query}\"")?;
            return Ok(());
        }
        let headers = vec!["Date".to_string(), "Name".to_string(), "Type".to_string()];
        let rows = results
            .iter()
            .map(|result| {
                vec![
                    self.paint(&result.date.format("%Y-%m-%d").to_string(), YELLOW),
                    display_name(&result.holiday),
                    result.holiday.kind.to_string(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    pub fn write_day_info<W: Write>(&self, out: &mut W, info: &DayInfo) -> anyhow::Result<()> {
        let mut heading = info.date.format("%A, %B %-d, %Y").to_string();
        if info.is_today {
            heading.push_str(" (today)");
        }
        writeln!(out, "{}", self.paint(&heading, CYAN))?;
        writeln!(out, "week      {}", info.iso_week)?;

        match &info.holiday {
            Some(holiday) => {
                writeln!(out, "holiday   {}", self.paint(&display_name(holiday), RED))?;
                writeln!(out, "type      {}", holiday.kind)?;
                writeln!(out, "scope     {}", scope_label(holiday))?;
                if let Some(since) = holiday.observed_since {
                    writeln!(out, "since     {since}")?;
                }
            }
            None => writeln!(out, "holiday   none")?,
        }
        Ok(())
    }

    pub fn write_status<W: Write>(&self, out: &mut W, state: &ViewState) -> anyhow::Result<()> {
        writeln!(out, "view      {}", state.view.label())?;
        writeln!(out, "period    {}", month_title(state.year, state.month))?;
        writeln!(
            out,
            "selected  {}",
            state
                .selected_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string())
        )?;
        writeln!(out, "country   {}", state.country)?;
        writeln!(out, "language  {}", state.language)?;
        writeln!(out, "theme     {}", state.theme.as_key())?;
        writeln!(out, "weekstart {}", state.week_starts_on.as_key())?;
        Ok(())
    }

    pub fn write_error<W: Write>(&self, out: &mut W, message: &str) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(message, RED))?;
        Ok(())
    }

    fn day_cell(&self, cell: &CalendarCell, highlighted: bool) -> String {
        let mut text = cell.date.format("%-d").to_string();
        if cell.holiday.is_some() {
            text.push('*');
        }
        if cell.is_selected {
            text = format!("[{text}]");
        } else if highlighted {
            text = format!("<{text}>");
        }

        if cell.is_today {
            self.paint(&text, INVERSE)
        } else if !cell.is_current_period {
            self.paint(&text, DIM)
        } else if cell.holiday.is_some() {
            self.paint(&text, RED)
        } else if cell.is_weekend {
            self.paint(&text, YELLOW)
        } else {
            text
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn weekday_headers(week_start: WeekStart) -> Vec<String> {
    grid::weekday_labels(week_start)
        .iter()
        .map(|label| label.to_string())
        .collect()
}

fn month_title(year: i32, month: u32) -> String {
    grid::first_day_of_month(year, month).format("%B %Y").to_string()
}

fn display_name(holiday: &HolidayRecord) -> String {
    match holiday.local_name.as_deref() {
        Some(local) if local != holiday.name => format!("{} ({local})", holiday.name),
        _ => holiday.name.clone(),
    }
}

fn scope_label(holiday: &HolidayRecord) -> String {
    match holiday.scope() {
        HolidayScope::National => "national".to_string(),
        HolidayScope::Regional(regions) => format!("regional: {}", regions.join(", ")),
    }
}

fn write_table<W: Write>(mut writer: W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ", width = *width)?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, width) in widths.iter().enumerate() {
            let cell = row.get(idx).map(String::as_str).unwrap_or("");
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
