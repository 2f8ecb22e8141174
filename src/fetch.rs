use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_LOCATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use crate::settings::Settings;
use crate::parser::RawDocument;

const REST_BASE: &str = "https://en.wikipedia.org/api/rest_v1";
const ACTION_BASE: &str = "https://en.wikipedia.org/w/api.php";
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1000;

static REDIRECT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[(.*?)\]\]").unwrap());

/// Fetch page wikitext, following one `#REDIRECT` hop.
pub async fn fetch_wikitext(settings: &Settings, title: &str) -> Result<RawDocument> {
    let client = Client::builder()
        .user_agent(&settings.user_agent)
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()?;

    let doc = fetch_source(&client, title).await?;
    match redirect_target(&doc.text) {
        Some(target) => {
            info!(from = %doc.title, to = target, "following redirect");
            fetch_source(&client, target).await
        }
        None => Ok(doc),
    }
}

/// REST source endpoint first; a 404 there falls back to the Action API.
async fn fetch_source(client: &Client, title: &str) -> Result<RawDocument> {
    let url = format!("{}/page/source/{}", REST_BASE, title);
    info!("Fetching wikitext: {}", url);

    let response = send_with_retry(|| client.get(&url).header(ACCEPT, "text/plain")).await?;
    if response.status() == StatusCode::NOT_FOUND {
        warn!(title, "REST source returned 404, falling back to Action API");
        return fetch_action_source(client, title).await;
    }

    let response = response
        .error_for_status()
        .with_context(|| format!("Failed to fetch source for {}", title))?;
    let resolved = response
        .headers()
        .get(CONTENT_LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(title_from_location)
        .unwrap_or(title)
        .to_string();
    let text = response.text().await?;

    info!(title = %resolved, bytes = text.len(), "fetched wikitext");
    Ok(RawDocument {
        title: resolved,
        text,
    })
}

async fn fetch_action_source(client: &Client, title: &str) -> Result<RawDocument> {
    let params = [
        ("action", "query"),
        ("prop", "revisions"),
        ("rvprop", "content"),
        ("rvslots", "main"),
        ("titles", title),
        ("redirects", "1"),
        ("formatversion", "2"),
        ("format", "json"),
    ];
    let response = send_with_retry(|| client.get(ACTION_BASE).query(&params))
        .await?
        .error_for_status()
        .with_context(|| format!("Action API request failed for {}", title))?;
    let body: ActionResponse = response.json().await?;
    document_from_action(body, title)
}

/// Retry on 429 and 5xx with exponential backoff.
async fn send_with_retry<F>(build: F) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    for attempt in 0..MAX_RETRIES {
        let response = build().send().await?;
        let status = response.status();
        if !is_transient(status) {
            return Ok(response);
        }
        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "HTTP {} (attempt {}/{}), backing off {:.1}s",
            status,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }
    Ok(build().send().await?)
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Target of a `#REDIRECT [[Target]]` page, without any section anchor.
pub fn redirect_target(text: &str) -> Option<&str> {
    let trimmed = text.trim_start();
    let is_redirect = trimmed
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("#REDIRECT"));
    if !is_redirect {
        return None;
    }
    let target = REDIRECT_LINK_RE.captures(trimmed)?.get(1)?.as_str();
    let target = target.split(['#', '|']).next().unwrap_or(target).trim();
    (!target.is_empty()).then_some(target)
}

/// `content-location` carries the canonical URL; its last path segment is
/// the resolved title.
fn title_from_location(location: &str) -> Option<&str> {
    location
        .rsplit('/')
        .next()
        .map(|t| t.split(['?', '#']).next().unwrap_or(t))
        .filter(|t| !t.is_empty())
}

pub fn save_raw(path: &Path, text: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = text.len(), "saved raw wikitext");
    Ok(())
}

// ── Action API payload ──

#[derive(Debug, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    query: Option<ActionQuery>,
}

#[derive(Debug, Deserialize)]
struct ActionQuery {
    #[serde(default)]
    pages: Vec<ActionPage>,
}

#[derive(Debug, Deserialize)]
struct ActionPage {
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    revisions: Vec<Revision>,
}

#[derive(Debug, Deserialize)]
struct Revision {
    slots: Slots,
}

#[derive(Debug, Deserialize)]
struct Slots {
    main: MainSlot,
}

#[derive(Debug, Deserialize)]
struct MainSlot {
    content: String,
}

fn document_from_action(body: ActionResponse, title: &str) -> Result<RawDocument> {
    let page = body
        .query
        .and_then(|q| q.pages.into_iter().next())
        .ok_or_else(|| anyhow!("Action API returned no pages for {}", title))?;
    if page.missing {
        bail!("Action API reports missing page for {}", title);
    }
    let text = page
        .revisions
        .into_iter()
        .next()
        .map(|r| r.slots.main.content)
        .ok_or_else(|| anyhow!("Action API returned no revisions for {}", title))?;
    Ok(RawDocument {
        title: page.title,
        text,
    })
}
