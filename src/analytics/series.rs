use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::ValueEnum;

use crate::analytics::ProviderAxis;
use crate::storage::Snapshot;

/// Label of the single series shown when no provider is selected.
pub const TOTAL_SERIES_LABEL: &str = "total";

/// How far back the trend view looks. Cutoffs are measured from "now", not
/// from calendar boundaries, so `Day` means the trailing 24 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeRange {
    #[value(name = "24h")]
    Day,
    #[value(name = "7d")]
    Week,
    #[value(name = "30d")]
    Month,
    All,
}

impl TimeRange {
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::Day => Some(now - Duration::hours(24)),
            TimeRange::Week => Some(now - Duration::days(7)),
            TimeRange::Month => Some(now - Duration::days(30)),
            TimeRange::All => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeRange::Day => "24h",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
            TimeRange::All => "all",
        }
    }
}

/// Collapse snapshots to at most one per UTC calendar day: the range filter
/// runs first, then the latest snapshot of each surviving day wins. Output
/// is ascending by timestamp whatever order the input came in.
pub fn daily_series(snapshots: &[Snapshot], range: TimeRange, now: DateTime<Utc>) -> Vec<Snapshot> {
    let cutoff = range.cutoff(now);
    let mut by_day: BTreeMap<NaiveDate, &Snapshot> = BTreeMap::new();

    for snapshot in snapshots {
        if let Some(cutoff) = cutoff {
            if snapshot.taken_at < cutoff {
                continue;
            }
        }
        let day = snapshot.taken_at.date_naive();
        match by_day.get(&day) {
            Some(kept) if kept.taken_at >= snapshot.taken_at => {}
            _ => {
                by_day.insert(day, snapshot);
            }
        }
    }

    by_day.into_values().cloned().collect()
}

/// Providers the user has chosen to overlay, per axis. Transitions hand back
/// a new selection instead of mutating, so a renderer holding the old value
/// never sees it change underneath.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSelection {
    inference: BTreeSet<String>,
    origin: BTreeSet<String>,
}

impl ProviderSelection {
    pub fn is_empty(&self) -> bool {
        self.inference.is_empty() && self.origin.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inference.len() + self.origin.len()
    }

    pub fn contains(&self, axis: ProviderAxis, name: &str) -> bool {
        self.axis_set(axis).contains(name)
    }

    pub fn toggled(&self, axis: ProviderAxis, name: &str) -> ProviderSelection {
        let mut next = self.clone();
        let set = match axis {
            ProviderAxis::Inference => &mut next.inference,
            ProviderAxis::Origin => &mut next.origin,
        };
        if !set.remove(name) {
            set.insert(name.to_string());
        }
        next
    }

    pub fn cleared(&self) -> ProviderSelection {
        ProviderSelection::default()
    }

    pub fn names(&self, axis: ProviderAxis) -> impl Iterator<Item = &str> {
        self.axis_set(axis).iter().map(String::as_str)
    }

    fn axis_set(&self, axis: ProviderAxis) -> &BTreeSet<String> {
        match axis {
            ProviderAxis::Inference => &self.inference,
            ProviderAxis::Origin => &self.origin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub taken_at: DateTime<Utc>,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
    pub label: String,
    pub points: Vec<SeriesPoint>,
}

/// Turn day-bucketed snapshots into plottable series.
///
/// With nothing selected there is exactly one series, the catalog total.
/// With selections, the total disappears and each selected provider gets its
/// own series, zero-filled on days where the provider was absent so every
/// series spans every bucketed day.
pub fn build_series(bucketed: &[Snapshot], selection: &ProviderSelection) -> Vec<TrendSeries> {
    if bucketed.is_empty() {
        return Vec::new();
    }

    if selection.is_empty() {
        let points = bucketed
            .iter()
            .map(|s| SeriesPoint {
                taken_at: s.taken_at,
                value: s.total_count,
            })
            .collect();
        return vec![TrendSeries {
            label: TOTAL_SERIES_LABEL.to_string(),
            points,
        }];
    }

    let mut series = Vec::with_capacity(selection.len());
    for axis in ProviderAxis::ALL {
        for name in selection.names(axis) {
            let points = bucketed
                .iter()
                .map(|s| SeriesPoint {
                    taken_at: s.taken_at,
                    value: s.counts(axis).get(name).copied().unwrap_or(0),
                })
                .collect();
            // Same name on both axes needs a disambiguating label
            let label = if selection.contains(axis.other(), name) {
                format!("{name} ({})", axis.label())
            } else {
                name.to_string()
            };
            series.push(TrendSeries { label, points });
        }
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn snap(taken_at: DateTime<Utc>, total: u64, inference: &[(&str, u64)]) -> Snapshot {
        Snapshot {
            taken_at,
            total_count: total,
            inference_providers: inference
                .iter()
                .map(|(n, c)| (n.to_string(), *c))
                .collect(),
            model_providers: BTreeMap::new(),
        }
    }

    #[test]
    fn keeps_latest_snapshot_of_each_day() {
        let snapshots = vec![
            snap(at(2025, 3, 1, 8, 0), 10, &[]),
            snap(at(2025, 3, 1, 20, 0), 12, &[]),
            snap(at(2025, 3, 2, 9, 0), 13, &[]),
        ];

        let now = at(2025, 3, 2, 12, 0);
        let bucketed = daily_series(&snapshots, TimeRange::All, now);

        assert_eq!(bucketed.len(), 2);
        assert_eq!(bucketed[0].total_count, 12);
        assert_eq!(bucketed[1].total_count, 13);
    }

    #[test]
    fn output_is_ascending_even_from_shuffled_input() {
        let snapshots = vec![
            snap(at(2025, 3, 3, 9, 0), 3, &[]),
            snap(at(2025, 3, 1, 9, 0), 1, &[]),
            snap(at(2025, 3, 2, 9, 0), 2, &[]),
        ];

        let bucketed = daily_series(&snapshots, TimeRange::All, at(2025, 3, 4, 0, 0));
        let totals: Vec<u64> = bucketed.iter().map(|s| s.total_count).collect();
        assert_eq!(totals, vec![1, 2, 3]);
    }

    #[test]
    fn narrower_range_yields_subsequence() {
        let snapshots: Vec<Snapshot> = (1..=20)
            .map(|d| snap(at(2025, 3, d, 12, 0), d as u64, &[]))
            .collect();
        let now = at(2025, 3, 20, 18, 0);

        let all = daily_series(&snapshots, TimeRange::All, now);
        let week = daily_series(&snapshots, TimeRange::Week, now);

        assert!(week.len() < all.len());
        // every point of the narrower range appears, in order, in the wider one
        let mut all_iter = all.iter();
        for point in &week {
            assert!(all_iter.any(|p| p.taken_at == point.taken_at));
        }
        for pair in week.windows(2) {
            assert!(pair[0].taken_at < pair[1].taken_at);
        }
    }

    #[test]
    fn day_range_measures_trailing_hours_not_calendar_day() {
        let snapshots = vec![
            snap(at(2025, 3, 1, 23, 0), 1, &[]),
            snap(at(2025, 3, 2, 8, 0), 2, &[]),
        ];

        // 10:00 on the 2nd: 23:00 of the 1st is within 24h and keeps its own bucket
        let bucketed = daily_series(&snapshots, TimeRange::Day, at(2025, 3, 2, 10, 0));
        assert_eq!(bucketed.len(), 2);

        // a week later both fall out
        let bucketed = daily_series(&snapshots, TimeRange::Day, at(2025, 3, 9, 10, 0));
        assert!(bucketed.is_empty());
    }

    #[test]
    fn no_history_means_no_series() {
        let series = build_series(&[], &ProviderSelection::default());
        assert!(series.is_empty());
    }

    #[test]
    fn total_series_shown_only_without_selection() {
        let bucketed = vec![
            snap(at(2025, 3, 1, 12, 0), 40, &[("Groq", 5)]),
            snap(at(2025, 3, 2, 12, 0), 42, &[("Groq", 6)]),
        ];

        let none = ProviderSelection::default();
        let series = build_series(&bucketed, &none);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label, TOTAL_SERIES_LABEL);
        assert_eq!(series[0].points[1].value, 42);

        let groq = none.toggled(ProviderAxis::Inference, "Groq");
        let series = build_series(&bucketed, &groq);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label, "Groq");
        assert!(series.iter().all(|s| s.label != TOTAL_SERIES_LABEL));
    }

    #[test]
    fn one_series_per_selected_provider() {
        let bucketed = vec![snap(at(2025, 3, 1, 12, 0), 40, &[("Groq", 5), ("Cerebras", 2)])];

        let selection = ProviderSelection::default()
            .toggled(ProviderAxis::Inference, "Groq")
            .toggled(ProviderAxis::Inference, "Cerebras");

        let series = build_series(&bucketed, &selection);
        assert_eq!(series.len(), 2);
        let labels: Vec<&str> = series.iter().map(|s| s.label.as_str()).collect();
        assert!(labels.contains(&"Groq"));
        assert!(labels.contains(&"Cerebras"));
    }

    #[test]
    fn absent_days_are_zero_filled() {
        let bucketed = vec![
            snap(at(2025, 3, 1, 12, 0), 40, &[("Groq", 5)]),
            snap(at(2025, 3, 2, 12, 0), 41, &[]),
            snap(at(2025, 3, 3, 12, 0), 42, &[("Groq", 7)]),
            snap(at(2025, 3, 4, 12, 0), 42, &[]),
            snap(at(2025, 3, 5, 12, 0), 43, &[("Groq", 8)]),
        ];

        let selection = ProviderSelection::default().toggled(ProviderAxis::Inference, "Groq");
        let series = build_series(&bucketed, &selection);

        assert_eq!(series.len(), 1);
        let values: Vec<u64> = series[0].points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![5, 0, 7, 0, 8]);
    }

    #[test]
    fn same_name_on_both_axes_gets_distinct_labels() {
        let mut snapshot = snap(at(2025, 3, 1, 12, 0), 40, &[("Meta", 3)]);
        snapshot.model_providers.insert("Meta".to_string(), 9);

        let selection = ProviderSelection::default()
            .toggled(ProviderAxis::Inference, "Meta")
            .toggled(ProviderAxis::Origin, "Meta");

        let series = build_series(&[snapshot], &selection);
        assert_eq!(series.len(), 2);
        assert_ne!(series[0].label, series[1].label);
    }

    #[test]
    fn toggling_leaves_the_original_untouched() {
        let original = ProviderSelection::default();
        let toggled = original.toggled(ProviderAxis::Inference, "Groq");

        assert!(original.is_empty());
        assert!(toggled.contains(ProviderAxis::Inference, "Groq"));

        let back = toggled.toggled(ProviderAxis::Inference, "Groq");
        assert!(back.is_empty());
        assert!(toggled.contains(ProviderAxis::Inference, "Groq"));
    }

    #[test]
    fn axes_select_independently() {
        let selection = ProviderSelection::default().toggled(ProviderAxis::Inference, "Meta");
        assert!(selection.contains(ProviderAxis::Inference, "Meta"));
        assert!(!selection.contains(ProviderAxis::Origin, "Meta"));
    }
}
