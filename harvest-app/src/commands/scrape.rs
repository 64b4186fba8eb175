//! Scrape and enqueue commands.
//!
//! Both accept the same JSON request: `{url, ...}` for one target or
//! `{urls: [...], ...}` for a batch sharing options. A `urls` key (any
//! case) selects batch handling.

use crate::commands::records::RecordResponse;
use crate::error::{CommandError, NOT_FOUND};
use crate::state::AppState;
use harvest_core::{BatchScrapeRequest, ScrapeOptions, ScrapingConfig};
use harvest_scheduler::{JobId, JobInfo, JobQueue, ScrapeJob};
use harvest_scraper::ScrapeOutcome;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A single record when exactly one URL survived validation, an array
/// otherwise.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScrapeResponse {
    Single(RecordResponse),
    Batch(Vec<RecordResponse>),
}

impl From<ScrapeOutcome> for ScrapeResponse {
    fn from(outcome: ScrapeOutcome) -> Self {
        match outcome {
            ScrapeOutcome::Single(saved) => Self::Single(RecordResponse::from(&saved.record)),
            ScrapeOutcome::Batch(saved) => Self::Batch(
                saved
                    .iter()
                    .map(|s| RecordResponse::from(&s.record))
                    .collect(),
            ),
        }
    }
}

/// Job handle(s) returned by [`enqueue`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EnqueueResponse {
    Single {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },
    Batch {
        #[serde(rename = "jobIds")]
        job_ids: Vec<JobId>,
    },
}

/// Turn a JSON request body into a batch request.
///
/// Entries of `urls` that are not strings are kept as blanks so they are
/// filtered out with the other invalid entries. A missing or negative
/// `waitTimeMs` falls back to the configured default; larger values are
/// clamped to `max_wait_ms`.
pub fn parse_scrape_request(
    body: &Value,
    config: &ScrapingConfig,
) -> Result<BatchScrapeRequest, CommandError> {
    let fields = body
        .as_object()
        .ok_or_else(|| CommandError::invalid("Request body must be a JSON object"))?;

    let urls = match field_ignore_case(fields, "urls") {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| entry.as_str().map(str::to_string))
            .collect(),
        Some(_) => return Err(CommandError::invalid("'urls' must be an array")),
        None => match fields.get("url") {
            Some(Value::String(url)) => vec![Some(url.clone())],
            Some(Value::Null) | None => {
                return Err(CommandError::invalid(
                    "Request must contain 'url' or 'urls'",
                ))
            }
            Some(_) => return Err(CommandError::invalid("'url' must be a string")),
        },
    };

    let options = ScrapeOptions {
        use_dynamic_rendering: fields
            .get("useDynamicScraping")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        render_wait_ms: fields
            .get("waitTimeMs")
            .and_then(Value::as_u64)
            .unwrap_or(config.default_wait_ms),
        selectors: parse_selectors(fields.get("selectors"))?,
    }
    .with_max_wait(config.max_wait_ms);

    Ok(BatchScrapeRequest { urls, options })
}

fn field_ignore_case<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    fields
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn parse_selectors(value: Option<&Value>) -> Result<BTreeMap<String, String>, CommandError> {
    match value {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .filter_map(|(name, selector)| {
                let selector = selector.as_str()?;
                Some((name.clone(), selector.to_string()))
            })
            .collect()),
        Some(_) => Err(CommandError::invalid(
            "'selectors' must map field names to CSS selectors",
        )),
    }
}

/// Acquire the requested URL(s) now and return the stored records.
pub async fn scrape(state: &AppState, body: &Value) -> Result<ScrapeResponse, CommandError> {
    let batch = parse_scrape_request(body, &state.config.scraping)?;
    let outcome = state.orchestrator.run(&batch).await?;
    Ok(outcome.into())
}

/// Hand the requested URL(s) to the job queue and return immediately.
pub async fn enqueue(state: &AppState, body: &Value) -> Result<EnqueueResponse, CommandError> {
    let batch = parse_scrape_request(body, &state.config.scraping)?;
    let requests = state.orchestrator.prepare(&batch)?;

    let mut job_ids = Vec::with_capacity(requests.len());
    for request in requests {
        job_ids.push(state.queue.enqueue(ScrapeJob::new(request)).await?);
    }
    tracing::info!(jobs = job_ids.len(), "Scrape jobs enqueued");

    Ok(match <[JobId; 1]>::try_from(job_ids) {
        Ok([job_id]) => EnqueueResponse::Single { job_id },
        Err(job_ids) => EnqueueResponse::Batch { job_ids },
    })
}

/// Current state of a queued job.
pub async fn job_status(state: &AppState, id: &str) -> Result<JobInfo, CommandError> {
    state
        .queue
        .status(&JobId::from(id))
        .await
        .ok_or_else(|| {
            CommandError::with_details(
                NOT_FOUND,
                "Job not found",
                serde_json::json!({ "id": id.trim() }),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: Value) -> Result<BatchScrapeRequest, CommandError> {
        parse_scrape_request(&body, &ScrapingConfig::default())
    }

    #[test]
    fn test_single_url_request() {
        let batch = parse(json!({ "url": "https://example.com" })).expect("parse");
        assert_eq!(batch.urls, vec![Some("https://example.com".to_string())]);
        assert!(!batch.options.use_dynamic_rendering);
        assert_eq!(batch.options.render_wait_ms, 5000);
    }

    #[test]
    fn test_urls_key_is_case_insensitive() {
        let batch = parse(json!({ "URLs": ["https://a.example", null, 42] })).expect("parse");
        assert_eq!(
            batch.urls,
            vec![Some("https://a.example".to_string()), None, None]
        );
    }

    #[test]
    fn test_urls_key_wins_over_url() {
        let batch = parse(json!({
            "url": "https://single.example",
            "urls": ["https://batch.example"]
        }))
        .expect("parse");
        assert_eq!(batch.urls, vec![Some("https://batch.example".to_string())]);
    }

    #[test]
    fn test_wait_time_defaults_and_clamps() {
        let batch = parse(json!({ "url": "https://e.example", "waitTimeMs": -1 })).expect("parse");
        assert_eq!(batch.options.render_wait_ms, 5000);

        let batch =
            parse(json!({ "url": "https://e.example", "waitTimeMs": 1500 })).expect("parse");
        assert_eq!(batch.options.render_wait_ms, 1500);

        let batch = parse(json!({ "url": "https://e.example", "waitTimeMs": 10_000_000 }))
            .expect("parse");
        assert_eq!(batch.options.render_wait_ms, 60_000);
    }

    #[test]
    fn test_options_are_shared() {
        let batch = parse(json!({
            "urls": ["https://a.example", "https://b.example"],
            "useDynamicScraping": true,
            "selectors": { "price": ".price", "ignored": 3 }
        }))
        .expect("parse");

        assert!(batch.options.use_dynamic_rendering);
        assert_eq!(batch.options.selectors.len(), 1);
        assert_eq!(batch.options.selectors["price"], ".price");
    }

    #[test]
    fn test_malformed_requests_rejected() {
        for body in [
            json!([]),
            json!({}),
            json!({ "url": 7 }),
            json!({ "urls": "https://a.example" }),
            json!({ "url": "https://a.example", "selectors": ["h1"] }),
        ] {
            let err = parse(body).expect_err("must reject");
            assert_eq!(err.code, crate::error::INVALID_REQUEST);
        }
    }
}
