//! # Query — Search, Filter, Sort, Paginate, Summarize
//!
//! The read-side operations the dashboard table and metric tiles are built
//! on. Everything here is pure and works on the client's in-memory list.
//!
//! - Free-text search: case-insensitive substring of the donor name, plain
//!   substring of the phone number, or case-insensitive substring of the channel.
//! - Status filter: `all`, or exact case-insensitive match with one status.
//! - Pagination: fixed page size, 1-based pages, `ceil(n / size)` pages.

use crate::export::parse_appointment_date;
use crate::records::{DonorRecord, DonorStatus, InventoryRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(DonorStatus),
}

impl StatusFilter {
    pub fn matches(self, record: &DonorRecord) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => status.matches(&record.status),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse::<DonorStatus>().map(StatusFilter::Only)
    }
}

/// Whether `record` matches the free-text `query` (empty matches everything).
pub fn matches_search(record: &DonorRecord, query: &str) -> bool {
    let needle = query.to_lowercase();
    record.donor_name.to_lowercase().contains(&needle)
        || record.phone_number.contains(query)
        || record.channel.to_lowercase().contains(&needle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    AppointmentDate,
    Status,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "date" | "appointment_date" | "appointmentdate" => Ok(SortKey::AppointmentDate),
            "status" => Ok(SortKey::Status),
            other => Err(format!("unknown sort key '{}' (expected name, date or status)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

fn compare(key: SortKey, a: &DonorRecord, b: &DonorRecord) -> Ordering {
    match key {
        SortKey::Name => a.donor_name.to_lowercase().cmp(&b.donor_name.to_lowercase()),
        SortKey::Status => a.status.to_lowercase().cmp(&b.status.to_lowercase()),
        // Unparseable dates sort after every real date.
        SortKey::AppointmentDate => match (
            parse_appointment_date(&a.appointment_date),
            parse_appointment_date(&b.appointment_date),
        ) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

/// Table view parameters.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub search: String,
    pub status: StatusFilter,
    pub sort: Option<(SortKey, SortDir)>,
}

impl RecordQuery {
    pub fn matches(&self, record: &DonorRecord) -> bool {
        matches_search(record, &self.search) && self.status.matches(record)
    }

    /// Records passing search and status filter, in sheet order unless sorted.
    pub fn apply<'a>(&self, records: &'a [DonorRecord]) -> Vec<&'a DonorRecord> {
        let mut out: Vec<&DonorRecord> = records.iter().filter(|r| self.matches(r)).collect();
        if let Some((key, dir)) = self.sort {
            out.sort_by(|a, b| {
                let ord = compare(key, a, b);
                match dir {
                    SortDir::Asc => ord,
                    SortDir::Desc => ord.reverse(),
                }
            });
        }
        out
    }
}

/// One page of a filtered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<'_, T> {
    /// 1-based range shown ("Showing first to last of total"); `(0, 0)` for an empty page.
    pub fn showing(&self) -> (usize, usize) {
        if self.items.is_empty() {
            return (0, 0);
        }
        let first = (self.page - 1) * self.page_size + 1;
        (first, first + self.items.len() - 1)
    }
}

pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    total_items.div_ceil(page_size.max(1))
}

/// Slice out 1-based `page`; pages past the end are empty, page 0 reads as page 1.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let page = page.max(1);
    let start = ((page - 1) * page_size).min(items.len());
    let end = (start + page_size).min(items.len());
    Page {
        items: &items[start..end],
        page,
        page_size,
        total_items: items.len(),
        total_pages: total_pages(items.len(), page_size),
    }
}

// ── Summary tiles ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_donors: usize,
    pub confirmed_appointments: usize,
    pub pending_appointments: usize,
    pub total_units: u64,
    /// Whole percent of donors whose status is booked or completed.
    pub confirmation_rate: u32,
}

impl DashboardSummary {
    pub fn compute(records: &[DonorRecord], inventory: &InventoryRecord) -> Self {
        let total = records.len();
        let confirmed = records
            .iter()
            .filter(|r| {
                let s = r.status.to_lowercase();
                s.contains("booked") || s.contains("completed")
            })
            .count();
        let pending = records
            .iter()
            .filter(|r| r.status.to_lowercase().contains("queued"))
            .count();
        let rate = if total > 0 {
            ((confirmed as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };
        DashboardSummary {
            total_donors: total,
            confirmed_appointments: confirmed,
            pending_appointments: pending,
            total_units: inventory.total_units(),
            confirmation_rate: rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donor(name: &str, phone: &str, channel: &str, status: &str) -> DonorRecord {
        DonorRecord {
            donor_name: name.into(),
            phone_number: phone.into(),
            channel: channel.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    #[test]
    fn search_matches_name_case_insensitively() {
        let list = vec![
            donor("John Doe", "555-1234", "Website", "Booked"),
            donor("Jane", "555-0000", "App", "Queued"),
        ];
        let q = RecordQuery {
            search: "john".into(),
            ..Default::default()
        };
        let hits = q.apply(&list);
        assert_eq!(hits, vec![&list[0]]);
    }

    #[test]
    fn search_matches_phone_and_channel() {
        let list = vec![
            donor("John Doe", "555-1234", "Website", "Booked"),
            donor("Jane", "555-0000", "App", "Queued"),
        ];
        let by_phone = RecordQuery {
            search: "0000".into(),
            ..Default::default()
        };
        assert_eq!(by_phone.apply(&list), vec![&list[1]]);
        let by_channel = RecordQuery {
            search: "WEB".into(),
            ..Default::default()
        };
        assert_eq!(by_channel.apply(&list), vec![&list[0]]);
    }

    #[test]
    fn status_filter_is_exact_not_substring() {
        let list = vec![
            donor("Completed Carl", "1", "completed-channel", "Booked"),
            donor("Ann", "2", "App", "COMPLETED"),
            donor("Bob", "3", "App", "Completed late"),
        ];
        let q = RecordQuery {
            status: "completed".parse().unwrap(),
            ..Default::default()
        };
        assert_eq!(q.apply(&list), vec![&list[1]]);
    }

    #[test]
    fn status_filter_parses_all_and_rejects_unknown() {
        assert_eq!("All".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert!("pending".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn twenty_three_records_make_three_pages() {
        let items: Vec<u32> = (0..23).collect();
        let p3 = paginate(&items, 3, 10);
        assert_eq!(p3.total_pages, 3);
        assert_eq!(p3.items, &[20, 21, 22]);
        assert_eq!(p3.showing(), (21, 23));
        assert!(paginate(&items, 4, 10).items.is_empty());
        assert_eq!(paginate(&items, 0, 10).page, 1);
    }

    #[test]
    fn empty_list_has_zero_pages() {
        let items: Vec<u32> = Vec::new();
        let p = paginate(&items, 1, 10);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.showing(), (0, 0));
    }

    #[test]
    fn sort_by_date_puts_unparseable_last() {
        let mut a = donor("A", "1", "", "Queued");
        a.appointment_date = "2026-03-01".into();
        let mut b = donor("B", "2", "", "Queued");
        b.appointment_date = "soon".into();
        let mut c = donor("C", "3", "", "Queued");
        c.appointment_date = "15-01-2026".into();
        let list = vec![a, b, c];
        let q = RecordQuery {
            sort: Some((SortKey::AppointmentDate, SortDir::Asc)),
            ..Default::default()
        };
        let names: Vec<&str> = q.apply(&list).iter().map(|r| r.donor_name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn summary_counts_and_rounds_rate() {
        let list = vec![
            donor("A", "1", "", "Booked"),
            donor("B", "2", "", "Completed"),
            donor("C", "3", "", "Queued"),
        ];
        let inv = InventoryRecord {
            blood_units_available: 120,
            plasma_units_available: 45,
            platelet_units_available: 30,
            last_updated: String::new(),
        };
        let s = DashboardSummary::compute(&list, &inv);
        assert_eq!(s.total_donors, 3);
        assert_eq!(s.confirmed_appointments, 2);
        assert_eq!(s.pending_appointments, 1);
        assert_eq!(s.total_units, 195);
        assert_eq!(s.confirmation_rate, 67);
        assert_eq!(DashboardSummary::compute(&[], &inv).confirmation_rate, 0);
    }
}
