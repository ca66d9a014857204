//! # Export — Donor Table to Spreadsheet File
//!
//! Renders donor records as a CSV document with the columns Donor Name,
//! Phone Number, Channel, Donation Type, Appointment Date, Time, Status,
//! optionally restricted to appointments within the last N days.
//!
//! Appointment dates are free text in the sheet. Accepted forms:
//! `YYYY-MM-DD`, RFC 3339 date-times, `YYYY/MM/DD`, and day-first
//! `DD-MM-YYYY` / `DD/MM/YYYY`. Records whose date cannot be parsed are left
//! out of any day-limited export.

use crate::records::DonorRecord;
use chrono::{DateTime, Days, NaiveDate};
use std::fmt;
use std::str::FromStr;

pub const EXPORT_HEADERS: [&str; 7] = [
    "Donor Name",
    "Phone Number",
    "Channel",
    "Donation Type",
    "Appointment Date",
    "Time",
    "Status",
];

/// Parse an appointment date in any of the accepted formats.
pub fn parse_appointment_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    let parts: Vec<&str> = s.split(['-', '/']).collect();
    if parts.len() != 3 {
        return None;
    }
    let nums: Vec<u32> = parts
        .iter()
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .ok()?;
    if parts[0].trim().len() == 4 {
        NaiveDate::from_ymd_opt(nums[0] as i32, nums[1], nums[2])
    } else {
        NaiveDate::from_ymd_opt(nums[2] as i32, nums[1], nums[0])
    }
}

/// Which appointments an export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportRange {
    #[default]
    All,
    LastDays(u32),
}

impl FromStr for ExportRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(ExportRange::All);
        }
        s.parse::<u32>()
            .map(ExportRange::LastDays)
            .map_err(|_| format!("invalid export range '{}' (expected a number of days or 'all')", s))
    }
}

impl fmt::Display for ExportRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportRange::All => f.write_str("all"),
            ExportRange::LastDays(n) => write!(f, "{}", n),
        }
    }
}

impl ExportRange {
    /// Earliest appointment date included, or `None` for no limit.
    ///
    /// A day count reaching past the calendar's start clamps to `NaiveDate::MIN`,
    /// so undated records are still left out.
    pub fn cutoff(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            ExportRange::All => None,
            ExportRange::LastDays(n) => Some(
                today
                    .checked_sub_days(Days::new(u64::from(n)))
                    .unwrap_or(NaiveDate::MIN),
            ),
        }
    }

    pub fn includes(self, record: &DonorRecord, today: NaiveDate) -> bool {
        match self.cutoff(today) {
            None => true,
            Some(cutoff) => {
                parse_appointment_date(&record.appointment_date).is_some_and(|d| d >= cutoff)
            }
        }
    }
}

pub fn select<'a>(
    records: &'a [DonorRecord],
    range: ExportRange,
    today: NaiveDate,
) -> Vec<&'a DonorRecord> {
    records.iter().filter(|r| range.includes(r, today)).collect()
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Render `records` as CSV with the export header row.
pub fn render_csv<'a>(records: impl IntoIterator<Item = &'a DonorRecord>) -> String {
    let mut csv = EXPORT_HEADERS.join(",");
    csv.push('\n');
    for r in records {
        let fields = [
            &r.donor_name,
            &r.phone_number,
            &r.channel,
            &r.donation_type,
            &r.appointment_date,
            &r.time,
            &r.status,
        ];
        let line: Vec<String> = fields.iter().map(|f| quote(f)).collect();
        csv.push_str(&line.join(","));
        csv.push('\n');
    }
    csv
}

pub fn export_filename(today: NaiveDate) -> String {
    format!("donors_export_{}.csv", today.format("%Y-%m-%d"))
}

/// Today's date in the local timezone, the reference point for day cutoffs.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on(date: &str, name: &str) -> DonorRecord {
        DonorRecord {
            donor_name: name.into(),
            appointment_date: date.into(),
            ..Default::default()
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_iso_and_day_first_forms() {
        assert_eq!(parse_appointment_date("2026-10-05"), Some(ymd(2026, 10, 5)));
        assert_eq!(parse_appointment_date("05-10-2026"), Some(ymd(2026, 10, 5)));
        assert_eq!(parse_appointment_date("5/10/2026"), Some(ymd(2026, 10, 5)));
        assert_eq!(parse_appointment_date("2026/10/05"), Some(ymd(2026, 10, 5)));
        assert_eq!(
            parse_appointment_date("2026-10-05T14:30:00Z"),
            Some(ymd(2026, 10, 5))
        );
    }

    #[test]
    fn rejects_garbage_and_impossible_dates() {
        assert_eq!(parse_appointment_date(""), None);
        assert_eq!(parse_appointment_date("Queued"), None);
        assert_eq!(parse_appointment_date("31-02-2026"), None);
        assert_eq!(parse_appointment_date("1-2"), None);
    }

    #[test]
    fn last_ten_days_excludes_older_appointments() {
        let today = ymd(2026, 10, 15);
        let list = vec![
            on("2026-10-05", "edge"),
            on("2026-10-04", "old"),
            on("14-10-2026", "recent"),
            on("2026-11-01", "future"),
            on("tbd", "unknown"),
        ];
        let kept: Vec<&str> = select(&list, ExportRange::LastDays(10), today)
            .iter()
            .map(|r| r.donor_name.as_str())
            .collect();
        assert_eq!(kept, vec!["edge", "recent", "future"]);
        assert_eq!(select(&list, ExportRange::All, today).len(), 5);
    }

    #[test]
    fn huge_day_count_clamps_instead_of_overflowing() {
        let today = ymd(2026, 10, 15);
        let range = ExportRange::LastDays(100_000_000);
        assert_eq!(range.cutoff(today), Some(NaiveDate::MIN));
        let list = vec![on("1900-01-01", "ancient"), on("tbd", "unknown")];
        let kept: Vec<&str> = select(&list, range, today)
            .iter()
            .map(|r| r.donor_name.as_str())
            .collect();
        assert_eq!(kept, vec!["ancient"]);
    }

    #[test]
    fn range_parses_days_or_all() {
        assert_eq!("all".parse::<ExportRange>().unwrap(), ExportRange::All);
        assert_eq!("30".parse::<ExportRange>().unwrap(), ExportRange::LastDays(30));
        assert!("-3".parse::<ExportRange>().is_err());
    }

    #[test]
    fn csv_has_header_and_escapes_quotes() {
        let mut r = on("2026-10-05", "Ann \"Nan\" Lee");
        r.phone_number = "555-1234".into();
        r.status = "Booked".into();
        let csv = render_csv([&r]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Donor Name,Phone Number,Channel,Donation Type,Appointment Date,Time,Status")
        );
        assert_eq!(
            lines.next(),
            Some("\"Ann \"\"Nan\"\" Lee\",\"555-1234\",\"\",\"\",\"2026-10-05\",\"\",\"Booked\"")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn filename_carries_the_date() {
        assert_eq!(export_filename(ymd(2026, 10, 15)), "donors_export_2026-10-15.csv");
    }
}
