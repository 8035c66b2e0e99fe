//! REST record store speaking PostgREST conventions.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::{MIN_TIMEOUT_MS, RecordStoreConfig};
use crate::record::{Domain, NewRecord, ReadSide, Record};
use crate::store::{RecordStore, TransportError};
use crate::transition::{ActorRole, RecordAction, transition};

const REST_PREFIX: &str = "/rest/v1";
const NEWEST_FIRST: &str = "created_at.desc";

pub type QueryPairs = Vec<(&'static str, String)>;

#[derive(Debug, Clone)]
pub struct RestRecordStore {
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
    timeout: Duration,
    request_attempts: usize,
    http: reqwest::Client,
}

/// Row shape returned by the data store; the domain is implied by the table.
#[derive(Debug, Deserialize)]
struct RecordRow {
    id: Value,
    owner_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    read_by_owner: bool,
    #[serde(default)]
    read_by_operator: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    payload: Value,
}

impl RecordRow {
    fn into_record(self, domain: Domain) -> Record {
        let id = match self.id {
            Value::String(id) => id,
            other => other.to_string(),
        };
        Record {
            id,
            owner_id: self.owner_id,
            domain,
            status: self.status.unwrap_or_default(),
            read_by_owner: self.read_by_owner,
            read_by_operator: self.read_by_operator,
            created_at: self.created_at,
            payload: self.payload,
        }
    }
}

enum Prefer {
    Minimal,
    Representation,
}

impl Prefer {
    fn header(&self) -> &'static str {
        match self {
            Self::Minimal => "return=minimal",
            Self::Representation => "return=representation",
        }
    }
}

impl RestRecordStore {
    pub fn new(config: RecordStoreConfig) -> Result<Self, TransportError> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            api_key: config.api_key,
            access_token: config.access_token,
            timeout: Duration::from_millis(config.timeout_ms.max(MIN_TIMEOUT_MS)),
            request_attempts: config.request_attempts.max(1),
            http: reqwest::Client::new(),
        })
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    #[must_use]
    pub fn table_path(domain: Domain) -> String {
        format!("{REST_PREFIX}/{}", domain.table())
    }

    #[must_use]
    pub fn owner_records_query(owner_id: &str) -> QueryPairs {
        vec![
            ("owner_id", eq(owner_id)),
            ("order", NEWEST_FIRST.to_string()),
        ]
    }

    #[must_use]
    pub fn domain_records_query() -> QueryPairs {
        vec![("order", NEWEST_FIRST.to_string())]
    }

    #[must_use]
    pub fn unread_filter(owner_id: Option<&str>, side: ReadSide) -> QueryPairs {
        let mut query = Vec::with_capacity(2);
        if let Some(owner_id) = owner_id {
            query.push(("owner_id", eq(owner_id)));
        }
        query.push((side.column(), "eq.false".to_string()));
        query
    }

    #[must_use]
    pub fn record_filter(record_id: &str) -> QueryPairs {
        vec![("id", eq(record_id))]
    }

    async fn select(&self, domain: Domain, query: QueryPairs) -> Result<Vec<Record>, TransportError> {
        let response = self
            .send(Method::GET, &Self::table_path(domain), &query, None, None)
            .await?;
        let rows: Vec<RecordRow> = decode_json_response(response).await?;
        Ok(rows.into_iter().map(|row| row.into_record(domain)).collect())
    }

    async fn update_flags(
        &self,
        domain: Domain,
        query: QueryPairs,
        patch: Map<String, Value>,
    ) -> Result<(), TransportError> {
        let response = self
            .send(
                Method::PATCH,
                &Self::table_path(domain),
                &query,
                Some(&Value::Object(patch)),
                Some(Prefer::Minimal),
            )
            .await?;
        expect_success(response).await
    }

    async fn update_one(
        &self,
        record_id: &str,
        domain: Domain,
        patch: Map<String, Value>,
    ) -> Result<Record, TransportError> {
        let response = self
            .send(
                Method::PATCH,
                &Self::table_path(domain),
                &Self::record_filter(record_id),
                Some(&Value::Object(patch)),
                Some(Prefer::Representation),
            )
            .await?;
        let rows: Vec<RecordRow> = decode_json_response(response).await?;
        rows.into_iter()
            .next()
            .map(|row| row.into_record(domain))
            .ok_or_else(|| TransportError::NotFound {
                record_id: record_id.to_string(),
            })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&Value>,
        prefer: Option<Prefer>,
    ) -> Result<reqwest::Response, TransportError> {
        let url = self.endpoint(path).ok_or(TransportError::InvalidPath)?;
        let mut last_error: Option<String> = None;

        for attempt in 0..self.request_attempts {
            let mut request = self
                .http
                .request(method.clone(), url.as_str())
                .query(query)
                .header("accept", "application/json")
                .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()))
                .timeout(self.timeout);
            if let Some(api_key) = self.api_key.as_deref() {
                request = request.header("apikey", api_key);
            }
            if let Some(token) = self.access_token.as_deref().or(self.api_key.as_deref()) {
                request = request.bearer_auth(token);
            }
            if let Some(prefer) = prefer.as_ref() {
                request = request.header("prefer", prefer.header());
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    tracing::debug!(
                        attempt,
                        path,
                        reason = %error,
                        "record store request failed"
                    );
                    last_error = Some(error.to_string());
                    if attempt + 1 >= self.request_attempts {
                        break;
                    }
                }
            }
        }

        Err(TransportError::Request {
            message: last_error.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn fetch_records(
        &self,
        owner_id: &str,
        domain: Domain,
    ) -> Result<Vec<Record>, TransportError> {
        self.select(domain, Self::owner_records_query(owner_id))
            .await
    }

    async fn fetch_domain(&self, domain: Domain) -> Result<Vec<Record>, TransportError> {
        self.select(domain, Self::domain_records_query()).await
    }

    async fn mark_all_read(&self, owner_id: &str, domain: Domain) -> Result<(), TransportError> {
        self.update_flags(
            domain,
            Self::unread_filter(Some(owner_id), ReadSide::Owner),
            flag_patch([(ReadSide::Owner, true)]),
        )
        .await
    }

    async fn mark_all_read_by_operator(&self, domain: Domain) -> Result<(), TransportError> {
        self.update_flags(
            domain,
            Self::unread_filter(None, ReadSide::Operator),
            flag_patch([(ReadSide::Operator, true)]),
        )
        .await
    }

    async fn mark_one_unread(
        &self,
        record_id: &str,
        domain: Domain,
        side: ReadSide,
    ) -> Result<(), TransportError> {
        self.update_one(record_id, domain, flag_patch([(side, false)]))
            .await
            .map(|_| ())
    }

    async fn apply_action(
        &self,
        record_id: &str,
        domain: Domain,
        actor: ActorRole,
        action: RecordAction,
        status: Option<&str>,
    ) -> Result<Record, TransportError> {
        let mut patch = flag_patch(transition(actor, action).assignments());
        if let Some(status) = status {
            patch.insert("status".to_string(), Value::String(status.to_string()));
        }
        self.update_one(record_id, domain, patch).await
    }

    async fn create_record(
        &self,
        record: NewRecord,
        actor: ActorRole,
    ) -> Result<Record, TransportError> {
        let domain = record.domain;
        let mut row = flag_patch(
            [(ReadSide::Owner, true), (ReadSide::Operator, true)]
                .into_iter()
                .chain(transition(actor, RecordAction::Create).assignments()),
        );
        row.insert("owner_id".to_string(), Value::String(record.owner_id));
        row.insert("status".to_string(), Value::String(record.status));
        row.insert("payload".to_string(), record.payload);

        let response = self
            .send(
                Method::POST,
                &Self::table_path(domain),
                &[],
                Some(&Value::Object(row)),
                Some(Prefer::Representation),
            )
            .await?;
        let rows: Vec<RecordRow> = decode_json_response(response).await?;
        rows.into_iter()
            .next()
            .map(|row| row.into_record(domain))
            .ok_or_else(|| TransportError::Decode {
                message: "insert returned no rows".to_string(),
            })
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value.trim())
}

/// Later assignments for the same column win.
fn flag_patch(assignments: impl IntoIterator<Item = (ReadSide, bool)>) -> Map<String, Value> {
    let mut patch = Map::new();
    for (side, read) in assignments {
        patch.insert(side.column().to_string(), Value::Bool(read));
    }
    patch
}

pub fn format_http_error(status: StatusCode, body: &[u8]) -> TransportError {
    let body = String::from_utf8_lossy(body).trim().to_string();
    let body = if body.is_empty() {
        "<empty>".to_string()
    } else {
        body
    };
    TransportError::Http { status, body }
}

fn normalize_base_url(base_url: &str) -> Result<String, TransportError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(TransportError::BaseUrlMissing);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, TransportError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|error| TransportError::Request {
            message: error.to_string(),
        })?;
    if !status.is_success() {
        return Err(format_http_error(status, &bytes));
    }
    Ok(bytes.to_vec())
}

async fn decode_json_response<T>(response: reqwest::Response) -> Result<T, TransportError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let bytes = read_body(response).await?;
    serde_json::from_slice::<T>(&bytes).map_err(|error| TransportError::Decode {
        message: error.to_string(),
    })
}

async fn expect_success(response: reqwest::Response) -> Result<(), TransportError> {
    read_body(response).await.map(|_| ())
}
