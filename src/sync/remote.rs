use crate::config::SyncSettings;
use crate::core::model::SyncRecord;
use crate::core::store::validate_configuration;
use crate::error::WorkbenchError;
use serde_json::Value;
use tokio::time::Duration;

/// Client for the single-row remote document table (PostgREST dialect).
pub struct RemoteStore {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    row_id: String,
}

impl RemoteStore {
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            endpoint: format!("{}/rest/v1/{}", settings.base_url, settings.table),
            api_key: settings.api_key.clone(),
            row_id: settings.row_id.clone(),
        }
    }

    pub fn row_id(&self) -> &str {
        &self.row_id
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Reads the configured row. `NotFound` if the table has no such row yet.
    pub async fn fetch(&self) -> Result<SyncRecord, WorkbenchError> {
        let url = format!("{}?id=eq.{}&select=*", self.endpoint, self.row_id);
        let res = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(unavailable)?;

        let rows = read_rows(res).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| WorkbenchError::NotFound(format!("remote record '{}'", self.row_id)))?;

        let record: SyncRecord =
            serde_json::from_value(row).map_err(|e| WorkbenchError::InvalidPayload(format!("remote record: {e}")))?;
        validate_configuration(&record.prompt_config)?;
        if record.test_profiles.is_empty() {
            return Err(WorkbenchError::InvalidPayload("remote record has no test profiles".into()));
        }
        Ok(record)
    }

    /// Inserts or overwrites the row with the same id.
    pub async fn upsert(&self, record: &SyncRecord) -> Result<(), WorkbenchError> {
        let url = format!("{}?on_conflict=id", self.endpoint);
        let res = self
            .request(reqwest::Method::POST, &url)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(record)
            .send()
            .await
            .map_err(unavailable)?;

        let rows = read_rows(res).await?;
        log::debug!("Upsert returned {} row(s)", rows.len());
        Ok(())
    }
}

async fn read_rows(res: reqwest::Response) -> Result<Vec<Value>, WorkbenchError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        log::warn!("Remote store error {status}: {body}");
        return Err(WorkbenchError::RemoteUnavailable(format!("HTTP {}", status.as_u16())));
    }

    let text = res.text().await.map_err(unavailable)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(&text)? {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        row => Ok(vec![row]),
    }
}

fn unavailable(e: reqwest::Error) -> WorkbenchError {
    WorkbenchError::RemoteUnavailable(e.to_string())
}
