//! Property-based tests for lifeflow's pure record operations.
//!
//! These tests use `proptest` to check invariants of reconciliation, the
//! query surface, and the export cutoff across randomly generated donor
//! lists.
//!
//! # Prerequisites
//!
//! - No network or filesystem access required.
//!
//! # How to run
//!
//! ```bash
//! cargo test --test property_tests
//!
//! # Increase case count for thorough testing (default is 256):
//! PROPTEST_CASES=10000 cargo test --test property_tests
//! ```
//!
//! # Testing strategy
//!
//! - **Reconciliation**: a uniquely listed target maps to `position + 2`; an
//!   absent target maps to nothing; appends land on `len + 2`.
//! - **Query**: filtering never invents records and keeps sheet order;
//!   pagination partitions the filtered list exactly.
//! - **Export**: a day-limited export never includes an appointment older
//!   than the cutoff, and never drops a parseable one inside it.

use chrono::{Duration, NaiveDate};
use lifeflow::export::{self, ExportRange};
use lifeflow::query::{self, RecordQuery, StatusFilter};
use lifeflow::reconcile;
use lifeflow::records::{DonorRecord, DonorStatus, RowIndex};
use proptest::prelude::*;

fn arb_status() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Queued".to_string()),
        Just("Booked".to_string()),
        Just("completed".to_string()),
        Just("CANCELLED".to_string()),
        "[A-Za-z ]{0,12}",
    ]
}

fn arb_record() -> impl Strategy<Value = DonorRecord> {
    (
        "[A-Za-z ]{1,16}",
        "[0-9-]{3,12}",
        prop_oneof![Just("Website"), Just("App"), Just("Walk-in"), Just("Referral")],
        arb_status(),
        0i64..400,
    )
        .prop_map(|(name, phone, channel, status, age)| {
            let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap() - Duration::days(age);
            DonorRecord {
                donor_name: name,
                phone_number: phone,
                channel: channel.to_string(),
                donation_type: "Blood".into(),
                appointment_date: date.format("%Y-%m-%d").to_string(),
                time: "09:00".into(),
                status,
                ..Default::default()
            }
        })
}

/// Lists whose `(name, phone)` pairs are unique, made so by suffixing the phone with the position.
fn arb_unique_list() -> impl Strategy<Value = Vec<DonorRecord>> {
    prop::collection::vec(arb_record(), 0..40).prop_map(|mut list| {
        for (i, r) in list.iter_mut().enumerate() {
            r.phone_number = format!("{}#{}", r.phone_number, i);
        }
        list
    })
}

proptest! {
    #[test]
    fn prop_locate_is_position_plus_two(list in arb_unique_list(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!list.is_empty());
        let pos = pick.index(list.len());
        let row = reconcile::locate(&list, &list[pos]);
        prop_assert_eq!(row, Some(RowIndex(pos as u32 + 2)));
    }

    #[test]
    fn prop_absent_target_is_not_found(list in arb_unique_list(), target in arb_record()) {
        let mut target = target;
        target.phone_number = "absent".into();
        prop_assert_eq!(reconcile::locate(&list, &target), None);
    }

    #[test]
    fn prop_append_lands_after_last_row(list in arb_unique_list()) {
        prop_assert_eq!(reconcile::appended_row_index(&list), RowIndex(list.len() as u32 + 2));
    }

    #[test]
    fn prop_filter_is_ordered_subset(
        list in prop::collection::vec(arb_record(), 0..40),
        search in "[a-z]{0,3}",
        status in prop::sample::select(vec!["all", "queued", "booked", "completed", "cancelled"]),
    ) {
        let q = RecordQuery {
            search: search.clone(),
            status: status.parse::<StatusFilter>().unwrap(),
            sort: None,
        };
        let hits = q.apply(&list);
        let expected: Vec<&DonorRecord> = list.iter().filter(|r| q.matches(r)).collect();
        prop_assert_eq!(&hits, &expected);
        for r in &hits {
            prop_assert!(query::matches_search(r, &search));
            if let StatusFilter::Only(s) = q.status {
                prop_assert!(r.status.eq_ignore_ascii_case(s.as_str()));
            }
        }
    }

    #[test]
    fn prop_pages_partition_the_list(len in 0usize..120, size in 1usize..25) {
        let items: Vec<usize> = (0..len).collect();
        let pages = query::total_pages(len, size);
        prop_assert_eq!(pages, len.div_ceil(size));
        let mut seen = Vec::new();
        for page in 1..=pages {
            let p = query::paginate(&items, page, size);
            prop_assert!(!p.items.is_empty());
            prop_assert!(p.items.len() <= size);
            seen.extend_from_slice(p.items);
        }
        prop_assert_eq!(seen, items.clone());
        prop_assert!(query::paginate(&items, pages + 1, size).items.is_empty());
    }

    #[test]
    fn prop_export_respects_cutoff(list in prop::collection::vec(arb_record(), 0..40), days in 0u32..200) {
        let today = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let cutoff = today - Duration::days(days as i64);
        let selected = export::select(&list, ExportRange::LastDays(days), today);
        for r in &selected {
            let d = export::parse_appointment_date(&r.appointment_date).unwrap();
            prop_assert!(d >= cutoff);
        }
        let inside = list
            .iter()
            .filter(|r| export::parse_appointment_date(&r.appointment_date).is_some_and(|d| d >= cutoff))
            .count();
        prop_assert_eq!(selected.len(), inside);
        prop_assert_eq!(export::render_csv(selected).lines().count(), inside + 1);
    }

    #[test]
    fn prop_status_parse_is_case_insensitive(pick in prop::sample::select(DonorStatus::ALL.to_vec()), upper in any::<bool>()) {
        let text = if upper { pick.as_str().to_uppercase() } else { pick.as_str().to_lowercase() };
        prop_assert_eq!(text.parse::<DonorStatus>().unwrap(), pick);
        prop_assert!(pick.matches(&text));
    }
}
