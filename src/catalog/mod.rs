use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Table the hosted catalog serves model rows from.
pub const DEFAULT_TABLE: &str = "ai_models_discovery";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One row of the hosted model catalog. Everything except the name is
/// optional; rows with sparse metadata are common.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelRecord {
    pub name: String,
    #[serde(default)]
    pub inference_provider: Option<String>,
    #[serde(default)]
    pub model_provider: Option<String>,
    #[serde(default)]
    pub modalities: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub rate_limits: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Read-only client for a PostgREST-style catalog endpoint
/// (`{base}/rest/v1/{table}`). The key, when present, is sent both as the
/// `apikey` header and as a bearer token, which is what hosted instances
/// expect.
pub struct CatalogClient {
    base_url: String,
    table: String,
    api_key: Option<String>,
}

impl CatalogClient {
    pub fn new(base_url: &str, table: &str, api_key: Option<String>) -> Self {
        CatalogClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            api_key,
        }
    }

    /// Fetch the full model list, ordered by name ascending.
    pub fn fetch_models(&self) -> Result<Vec<ModelRecord>> {
        let url = format!("{}/rest/v1/{}", self.base_url, self.table);
        let mut request = ureq::get(&url)
            .timeout(REQUEST_TIMEOUT)
            .query("select", "*")
            .query("order", "name.asc");
        if let Some(key) = &self.api_key {
            request = request
                .set("apikey", key)
                .set("Authorization", &format!("Bearer {key}"));
        }

        let response = request.call().map_err(|e| Error::Source(describe(e)))?;
        response
            .into_json::<Vec<ModelRecord>>()
            .map_err(|e| Error::Source(format!("malformed catalog response: {e}")))
    }

    pub fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }
}

fn describe(err: ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, _) => format!("catalog returned HTTP {code}"),
        ureq::Error::Transport(t) => t.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_full_row() {
        let json = r#"{
            "name": "llama-3.3-70b",
            "inference_provider": "Groq",
            "model_provider": "Meta",
            "modalities": "text",
            "task_type": "chat",
            "license": "llama3.3",
            "rate_limits": "30 rpm",
            "api_url": "https://api.groq.com/openai/v1"
        }"#;

        let record: ModelRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "llama-3.3-70b");
        assert_eq!(record.inference_provider.as_deref(), Some("Groq"));
        assert_eq!(record.model_provider.as_deref(), Some("Meta"));
    }

    #[test]
    fn deserializes_sparse_row() {
        let record: ModelRecord = serde_json::from_str(r#"{"name": "mystery-model"}"#).unwrap();
        assert_eq!(record.name, "mystery-model");
        assert!(record.inference_provider.is_none());
        assert!(record.model_provider.is_none());
    }

    #[test]
    fn ignores_unknown_columns() {
        let json = r#"{"name": "m", "id": 7, "created_at": "2025-01-01T00:00:00Z"}"#;
        let record: ModelRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "m");
    }

    #[test]
    fn client_normalizes_base_url() {
        let client = CatalogClient::new("https://example.supabase.co/", DEFAULT_TABLE, None);
        assert_eq!(
            client.endpoint(),
            "https://example.supabase.co/rest/v1/ai_models_discovery"
        );
    }
}
