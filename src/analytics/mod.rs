mod axis;
mod counts;
mod series;

pub use axis::AxisScale;
pub use counts::{ProviderCounts, UNKNOWN_PROVIDER};
pub use series::{
    ProviderSelection, SeriesPoint, TOTAL_SERIES_LABEL, TimeRange, TrendSeries, build_series,
    daily_series,
};

/// The two provider dimensions a catalog row carries: who serves inference
/// for the model, and who originally produced it. Counts on the two axes are
/// tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderAxis {
    Inference,
    Origin,
}

impl ProviderAxis {
    pub const ALL: [ProviderAxis; 2] = [ProviderAxis::Inference, ProviderAxis::Origin];

    pub fn label(self) -> &'static str {
        match self {
            ProviderAxis::Inference => "inference",
            ProviderAxis::Origin => "origin",
        }
    }

    pub fn other(self) -> ProviderAxis {
        match self {
            ProviderAxis::Inference => ProviderAxis::Origin,
            ProviderAxis::Origin => ProviderAxis::Inference,
        }
    }

    pub(crate) fn db_code(self) -> i64 {
        match self {
            ProviderAxis::Inference => 0,
            ProviderAxis::Origin => 1,
        }
    }

    pub(crate) fn from_db_code(code: i64) -> Option<ProviderAxis> {
        match code {
            0 => Some(ProviderAxis::Inference),
            1 => Some(ProviderAxis::Origin),
            _ => None,
        }
    }
}
