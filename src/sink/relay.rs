//! Out-of-band replay of stored, not yet confirmed events to the accounting endpoint.
//!
//! Events are sent strictly by timestamp. The first failure stops the replay so the
//! remote side never sees them out of order; the next run resumes from that event.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, NaiveTime, Utc};
use itertools::Itertools;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::counter::SinkError;

const DUPLICATE_TOKENS: [&str; 3] = [
    "PRIMARY KEY constraint",
    "duplicate key",
    "Cannot insert duplicate key",
];

/// Timestamp layout the accounting endpoint expects
pub const RELAY_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Stored event not confirmed by the accounting endpoint yet
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub id: Uuid,
    /// Timestamp as stored, see `normalize_timestamp` for accepted layouts
    pub ts: String,
    pub count_delta: i32,
}

/// Durable storage of events awaiting relay.
///
/// `pending` may return the whole backlog; `replay_pending` only sends what falls into its window.
pub trait PendingStore {
    fn pending(&self) -> Vec<PendingEvent>;
    fn mark_sent(&mut self, id: Uuid, sent_at: DateTime<Utc>);
}

/// Accounting endpoint. Returns raw response body.
#[async_trait]
pub trait RelayTarget: Send + Sync {
    async fn post(&self, fecha_hora: &str) -> Result<String, SinkError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Ok,
    /// Remote already has the record
    Duplicate,
    /// Explicit null answer
    Null,
    Rejected(String),
}

impl RelayOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RelayOutcome::Ok | RelayOutcome::Duplicate)
    }
    pub fn into_result(self) -> Result<(), SinkError> {
        match self {
            RelayOutcome::Ok | RelayOutcome::Duplicate => Ok(()),
            RelayOutcome::Null => Err(SinkError::Rejected("null answer".to_string())),
            RelayOutcome::Rejected(text) => Err(SinkError::Rejected(text)),
        }
    }
}

/// Interprets the SOAP-ish body returned by the accounting endpoint
pub fn classify_response(body: &str) -> RelayOutcome {
    let text = body.trim();
    let lower = text.to_lowercase();
    if lower.contains("xsi:nil=\"true\"") {
        return RelayOutcome::Null;
    }
    if DUPLICATE_TOKENS
        .iter()
        .any(|token| lower.contains(&token.to_lowercase()))
    {
        return RelayOutcome::Duplicate;
    }
    let answer = xml_text(text).unwrap_or(text);
    if answer.trim().eq_ignore_ascii_case("OK") {
        return RelayOutcome::Ok;
    }
    RelayOutcome::Rejected(answer.trim().to_string())
}

// Text content of the root element, e.g. `OK` for `<?xml ...?><string xmlns="...">OK</string>`
fn xml_text(body: &str) -> Option<&str> {
    let mut rest = body;
    if rest.starts_with("<?") {
        let end = rest.find("?>")?;
        rest = rest[end + 2..].trim_start();
    }
    if !rest.starts_with('<') {
        return None;
    }
    let open_end = rest.find('>')?;
    let inner = &rest[open_end + 1..];
    let close = inner.rfind("</")?;
    Some(&inner[..close])
}

/// Brings stored timestamp to `YYYY-MM-DD HH:MM:SS`.
///
/// Accepts ISO 8601 (`T` separator, `Z` suffix, fractional seconds) and `DD/MM/YYYY HH:MM:SS`.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    let mut s = raw.trim().replace('T', " ").replace('Z', "");
    if let Some(dot) = s.find('.') {
        s.truncate(dot);
    }
    let s: String = s.chars().take(19).collect();
    let parsed = NaiveDateTime::parse_from_str(&s, RELAY_TS_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(&s, "%d/%m/%Y %H:%M:%S"))
        .ok()?;
    Some(parsed.format(RELAY_TS_FORMAT).to_string())
}

/// Start of the replay window: midnight of the day before `now` (local time of the store)
pub fn pending_since(now: NaiveDateTime) -> NaiveDateTime {
    (now.date() - ChronoDuration::days(1)).and_time(NaiveTime::default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub sent: usize,
    /// Events with non-positive delta, never sent
    pub skipped: usize,
    /// Events older than the window, left pending
    pub stale: usize,
    pub failed: usize,
    /// Last answer that stopped the replay
    pub last_error: Option<String>,
}

/// Sends pending events not older than `since`, oldest first, and marks confirmed ones as sent.
/// Stops at the first failure. See `pending_since` for the usual window.
pub async fn replay_pending<S, T>(store: &mut S, target: &T, since: NaiveDateTime) -> RelayReport
where
    S: PendingStore + ?Sized,
    T: RelayTarget + ?Sized,
{
    let mut report = RelayReport::default();
    let pending = store
        .pending()
        .into_iter()
        .sorted_by(|a, b| {
            let a_ts = normalize_timestamp(&a.ts).unwrap_or_else(|| a.ts.clone());
            let b_ts = normalize_timestamp(&b.ts).unwrap_or_else(|| b.ts.clone());
            a_ts.cmp(&b_ts)
        })
        .collect::<Vec<_>>();
    for event in pending {
        if event.count_delta <= 0 {
            report.skipped += 1;
            continue;
        }
        let fecha_hora = match normalize_timestamp(&event.ts) {
            Some(ts) if ts < since.format(RELAY_TS_FORMAT).to_string() => {
                report.stale += 1;
                continue;
            }
            Some(ts) => ts,
            None => {
                report.failed += 1;
                report.last_error = Some(format!("unparseable timestamp {:?}", event.ts));
                break;
            }
        };
        let result = match target.post(&fecha_hora).await {
            Ok(body) => classify_response(&body).into_result(),
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                store.mark_sent(event.id, Utc::now());
                report.sent += 1;
            }
            Err(err) => {
                warn!(event_id = %event.id, ts = %fecha_hora, error = %err, "relay stopped to keep ordering");
                report.failed += 1;
                report.last_error = Some(err.to_string());
                break;
            }
        }
    }
    info!(
        sent = report.sent,
        skipped = report.skipped,
        stale = report.stale,
        failed = report.failed,
        "relay finished"
    );
    report
}

/// Form POST to `recibeMovimientosDeaUno_V6`
pub struct HttpRelayTarget {
    url: String,
    config: RelayConfig,
    http_client: reqwest::Client,
}

impl HttpRelayTarget {
    pub fn new(config: RelayConfig) -> Result<Self, SinkError> {
        let timeout = Duration::try_from_secs_f64(config.timeout_seconds).map_err(|_| {
            SinkError::Rejected(format!("invalid relay timeout: {}s", config.timeout_seconds))
        })?;
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpRelayTarget {
            url: format!(
                "{}/recibeMovimientosDeaUno_V6",
                config.base_url.trim_end_matches('/')
            ),
            config,
            http_client,
        })
    }
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RelayTarget for HttpRelayTarget {
    async fn post(&self, fecha_hora: &str) -> Result<String, SinkError> {
        let form = [
            ("BASE_DATOS_CLIENTE", self.config.base_datos_cliente.as_str()),
            ("CASI_COD", self.config.casi_cod.as_str()),
            ("LECT_COD", self.config.lect_cod.as_str()),
            ("FECHA_HORA", fecha_hora),
            ("pass", self.config.password.as_str()),
        ];
        let response = self.http_client.post(&self.url).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(SinkError::Status(response.status().as_u16()));
        }
        Ok(response.text().await?)
    }
}
