use futures::future::join_all;
use log::debug;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;

use super::client::USER_AGENT;
use crate::common::Payload;

/// Field under which HEAD results are recorded
pub const HEAD_STATUS_FIELD: &str = "head_status";

/// Client for HEAD checks against hosts named in payloads. It has no default
/// headers, so the PurlDB token never leaves the PurlDB client.
pub fn create_head_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().user_agent(USER_AGENT).timeout(timeout).build()
}

/// Status code of a HEAD request to `url`, or `None` when the request failed
pub async fn check_url_status(client: &Client, url: &str, timeout: Duration) -> Option<u16> {
    match client.head(url).timeout(timeout).send().await {
        Ok(resp) => Some(resp.status().as_u16()),
        Err(e) => {
            debug!("HEAD request failed for {}: {}", url, e);
            None
        }
    }
}

/// Issue a HEAD request for every string field ending in `_url` and record
/// the status codes under `head_status.<field>` (null on failure).
pub async fn annotate_head_status(client: &Client, payload: &mut Payload, timeout: Duration) {
    let targets: Vec<(String, String)> = payload
        .fields()
        .keys()
        .filter(|field| field.ends_with("_url"))
        .filter_map(|field| {
            payload
                .get_str(field)
                .ok()
                .filter(|url| !url.is_empty())
                .map(|url| (field.clone(), url.to_string()))
        })
        .collect();

    if targets.is_empty() {
        return;
    }

    let statuses = join_all(
        targets
            .iter()
            .map(|(_, url)| check_url_status(client, url, timeout)),
    )
    .await;

    let mut head_status = Map::new();
    for ((field, _), status) in targets.into_iter().zip(statuses) {
        head_status.insert(field, status.map(Value::from).unwrap_or(Value::Null));
    }
    payload.insert(HEAD_STATUS_FIELD, Value::Object(head_status));
}
