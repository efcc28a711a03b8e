use std::collections::BTreeMap;

use crate::analytics::ProviderAxis;
use crate::catalog::ModelRecord;

/// Bucket for rows that name no provider (or an empty one).
pub const UNKNOWN_PROVIDER: &str = "Unknown";

/// Per-provider model totals derived from one catalog fetch. `total` is the
/// full row count; the two maps partition it along each axis, so the values
/// in either map sum back to `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderCounts {
    pub total: u64,
    pub inference: BTreeMap<String, u64>,
    pub origin: BTreeMap<String, u64>,
}

impl ProviderCounts {
    pub fn from_models(models: &[ModelRecord]) -> ProviderCounts {
        let mut counts = ProviderCounts {
            total: models.len() as u64,
            ..ProviderCounts::default()
        };
        for model in models {
            let inference = provider_key(&model.inference_provider);
            let origin = provider_key(&model.model_provider);
            *counts.inference.entry(inference.to_string()).or_insert(0) += 1;
            *counts.origin.entry(origin.to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn for_axis(&self, axis: ProviderAxis) -> &BTreeMap<String, u64> {
        match axis {
            ProviderAxis::Inference => &self.inference,
            ProviderAxis::Origin => &self.origin,
        }
    }
}

fn provider_key(provider: &Option<String>) -> &str {
    match provider.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => UNKNOWN_PROVIDER,
    }
}
