//! Property tests for reconciliation invariants.
//!
//! Uses proptest to verify:
//! 1. Planner skips iff the watermark is exactly yesterday
//! 2. Merging is idempotent and never proposes stored dates or today
//! 3. Alignment output is strictly ascending and dated from its inputs
//! 4. Replay streams never repeat a row, and bad snapshots are invisible

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use proptest::prelude::*;
use std::collections::BTreeSet;
use pricewatch_core::data::{
    align, ratio, FetchRange, SourceBatch, SourceMerger, WatermarkPlanner,
};
use pricewatch_core::domain::{
    DatedValue, EntityReading, EntitySnapshot, Series, UnitReading,
};
use pricewatch_core::replay::{replay, ReplayConfig, ReplayOutput};

// ── Strategies (proptest) ────────────────────────────────────────────

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn day(offset: u64) -> NaiveDate {
    base() + Days::new(offset)
}

/// Ascending series with distinct dates inside the first `span` days.
fn arb_series(span: u64, max_len: usize) -> impl Strategy<Value = Series> {
    prop::collection::btree_map(0..span, 1..10_000u32, 0..max_len).prop_map(|m| {
        Series::from_map(
            m.into_iter()
                .map(|(off, cents)| (day(off), cents as f64 / 100.0))
                .collect(),
        )
    })
}

fn arb_dates(span: u64) -> impl Strategy<Value = BTreeSet<NaiveDate>> {
    prop::collection::btree_set((0..span).prop_map(day), 0..20)
}

/// (day offset, minute of day, entity index, primary price in tenths)
type RawSnapshot = (u64, u32, usize, u32);

fn arb_log() -> impl Strategy<Value = Vec<RawSnapshot>> {
    prop::collection::vec((0..15u64, 0..1440u32, 0..3usize, 1900..1910u32), 1..30)
}

fn build_log(raw: &[RawSnapshot]) -> Vec<EntitySnapshot> {
    const ENTITIES: [&str; 3] = ["ao", "n1", "ob"];
    raw.iter()
        .enumerate()
        .map(|(i, (off, minute, entity, tenths))| {
            let time = NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).unwrap();
            let price = *tenths as f64 / 10.0;
            EntitySnapshot {
                id: format!("s{i}"),
                timestamp: NaiveDateTime::new(day(*off), time),
                tag: "auto.prices.update".into(),
                readings: [(
                    ENTITIES[*entity].to_string(),
                    Some(EntityReading::new(vec![UnitReading {
                        unit: "u0".into(),
                        primary: Some(price),
                        secondary: Some(price - 10.0),
                    }])),
                )]
                .into_iter()
                .collect(),
            }
        })
        .collect()
}

fn no_consecutive_repeats(out: &ReplayOutput) -> bool {
    let spread_ok = out
        .spread
        .records()
        .windows(2)
        .all(|w| w[0].values != w[1].values);
    let entities_ok = out
        .entities
        .values()
        .all(|s| s.records().windows(2).all(|w| w[0].values != w[1].values));
    spread_ok && entities_ok
}

// ── 1. Watermark planning ────────────────────────────────────────────

proptest! {
    #[test]
    fn skip_iff_watermark_is_yesterday(last in 0..400u64, gap in 0..5u64) {
        let planner = WatermarkPlanner::new(base());
        let last_stored = day(last);
        let as_of = day(last + gap);
        let plan = planner.plan(Some(last_stored), as_of).unwrap();
        prop_assert_eq!(plan.is_skip(), gap == 1);
        if let Some(range) = plan.range() {
            prop_assert_eq!(range.start, last_stored);
            prop_assert_eq!(range.end, as_of);
        }
    }

    #[test]
    fn watermark_after_as_of_is_rejected(last in 1..400u64, back in 1..30u64) {
        let planner = WatermarkPlanner::new(base());
        let as_of = day(last.saturating_sub(back));
        prop_assume!(as_of < day(last));
        prop_assert!(planner.plan(Some(day(last)), as_of).is_err());
    }
}

// ── 2. Merging ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_is_idempotent_and_excludes_known_dates(
        primary in arb_series(60, 40),
        fallback in arb_series(60, 40),
        existing in arb_dates(60),
        fb_existing in arb_dates(60),
        today_off in 0..60u64,
    ) {
        prop_assume!(!primary.is_empty() && !fallback.is_empty());
        let today = day(today_off);
        let requested = FetchRange::new(base(), day(60));
        let merger = SourceMerger::new(today);
        let batches = || {
            (
                SourceBatch { source: "p", requested, series: &primary, existing: &existing },
                SourceBatch { source: "f", requested, series: &fallback, existing: &fb_existing },
            )
        };

        let (p, f) = batches();
        let first = merger.merge(p, Some(f)).unwrap();
        let (p, f) = batches();
        let second = merger.merge(p, Some(f)).unwrap();
        prop_assert_eq!(&first, &second);

        for row in &first.primary {
            prop_assert!(row.date != today);
            prop_assert!(!existing.contains(&row.date));
        }
        for row in &first.fallback {
            prop_assert!(row.date != today);
            prop_assert!(!fb_existing.contains(&row.date));
        }
        let unique: BTreeSet<_> = first.primary.iter().map(|r| r.date).collect();
        prop_assert_eq!(unique.len(), first.primary.len());
    }
}

// ── 3. Alignment ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn aligned_output_is_ascending_and_dated_from_inputs(
        a in arb_series(90, 50),
        b in arb_series(90, 50),
    ) {
        let out = align(&a, &b, ratio(4)).unwrap();
        let dates: Vec<NaiveDate> = out.iter().map(|p| p.date).collect();
        prop_assert!(dates.windows(2).all(|w| w[0] < w[1]));

        let inputs: BTreeSet<NaiveDate> = a.dates().union(&b.dates()).copied().collect();
        for date in &dates {
            prop_assert!(inputs.contains(date));
        }
        if let (Some(fa), Some(fb)) = (a.first(), b.first()) {
            if let Some(first) = out.first() {
                prop_assert!(first.date >= fa.date.max(fb.date));
            }
        } else {
            prop_assert!(out.is_empty());
        }
    }

    #[test]
    fn aligned_values_pair_latest_known_inputs(
        a in arb_series(90, 50),
        b in arb_series(90, 50),
    ) {
        let out = align(&a, &b, |x, y| Ok(x - y)).unwrap();
        for DatedValue { date, value } in out.iter().copied() {
            // each side contributes its latest value on or before the output date
            let av = a.iter().filter(|p| p.date <= date).last().map(|p| p.value);
            let bv = b.iter().filter(|p| p.date <= date).last().map(|p| p.value);
            prop_assert_eq!(Some(value), av.zip(bv).map(|(x, y)| x - y));
        }
    }
}

// ── 4. Replay ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn replay_streams_never_repeat_rows(raw in arb_log()) {
        let out = replay(build_log(&raw), ReplayConfig::default());
        prop_assert!(no_consecutive_repeats(&out));
    }

    #[test]
    fn bad_snapshot_is_equivalent_to_absent_snapshot(
        raw in arb_log(),
        pick in any::<prop::sample::Index>(),
    ) {
        let log = build_log(&raw);
        let k = pick.index(log.len());
        let through = Some(day(15));

        let flagged = ReplayConfig {
            bad_snapshots: [log[k].id.clone()].into_iter().collect(),
            through,
            ..ReplayConfig::default()
        };
        let mut without = log.clone();
        without.remove(k);
        let plain = ReplayConfig { through, ..ReplayConfig::default() };

        let a = replay(log, flagged);
        let b = replay(without, plain);
        prop_assume!(a.days == b.days);
        prop_assert_eq!(a.spread, b.spread);
        prop_assert_eq!(a.entities, b.entities);
    }
}
