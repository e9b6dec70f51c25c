//! Render Routes
//!
//! - GET|POST /render - Aligned series for one or more glob targets
//!
//! Parameters come from the query string and, for POST, from a form body:
//! `target` (repeatable), `from`, `until`. Times are epoch seconds, `now`,
//! or offsets such as `-6h`, `-30min`, `-2d`, `-1w`, optionally written as
//! `now-6h`. The window defaults to the last 24 hours.

use axum::{
    extract::{RawQuery, State},
    Json,
};
use chrono::Utc;
use futures_util::future::try_join_all;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use crate::api::dto::{RenderParams, RenderSeries};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::query::{Node, MAX_EPOCH_SECONDS};

const DEFAULT_WINDOW_SECS: i64 = 86_400;

/// GET|POST /render
pub async fn render(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    body: String,
) -> ApiResult<Json<Vec<RenderSeries>>> {
    let mut params = RenderParams::default();
    parse_form(query.as_deref().unwrap_or(""), &mut params)?;
    parse_form(&body, &mut params)?;

    if params.targets.is_empty() {
        return Err(ApiError::Validation("at least one target is required".to_string()));
    }

    let now = Utc::now().timestamp();
    let until = match &params.until {
        Some(value) => parse_time(value, now)?,
        None => now,
    };
    let from = match &params.from {
        Some(value) => parse_time(value, now)?,
        None => until - DEFAULT_WINDOW_SECS,
    };
    if from >= until {
        return Err(ApiError::Validation(format!(
            "from ({}) must be before until ({})",
            from, until
        )));
    }

    let found = try_join_all(params.targets.iter().map(|t| state.engine.find(t))).await?;

    let mut seen = HashSet::new();
    let leaves: Vec<Node> = found
        .into_iter()
        .flatten()
        .filter(|node| node.is_leaf() && seen.insert(node.path().clone()))
        .collect();

    let result = state.engine.fetch(&leaves, from, until).await?;

    let series = leaves
        .iter()
        .filter_map(|leaf| {
            let target = leaf.path().to_string();
            let values = result.series.get(&target)?;
            Some(RenderSeries::new(target, values, &result.time_info))
        })
        .collect();

    Ok(Json(series))
}

/// Collect render parameters from an urlencoded form
pub fn parse_form(input: &str, params: &mut RenderParams) -> ApiResult<()> {
    for pair in input.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key)?;
        let value = decode(value)?;
        match key.as_str() {
            "target" if !value.is_empty() => params.targets.push(value),
            "from" => params.from = Some(value),
            "until" => params.until = Some(value),
            _ => {}
        }
    }
    Ok(())
}

fn decode(raw: &str) -> ApiResult<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|s| s.into_owned())
        .map_err(|e| ApiError::Validation(format!("bad encoding in {:?}: {}", raw, e)))
}

fn relative_time_regex() -> &'static Regex {
    static RELATIVE: OnceLock<Regex> = OnceLock::new();
    RELATIVE.get_or_init(|| {
        Regex::new(r"^(?:now)?-(\d+)(s|sec|secs|seconds?|min|mins|minutes?|h|hours?|d|days?|w|weeks?|mon|months?|y|years?)$")
            .expect("relative time pattern is valid")
    })
}

/// Resolve a Graphite time expression to epoch seconds
///
/// Results outside `±MAX_EPOCH_SECONDS` are rejected.
pub fn parse_time(value: &str, now: i64) -> ApiResult<i64> {
    let value = value.trim();
    let time = if value.is_empty() || value == "now" {
        now
    } else if let Ok(epoch) = value.parse::<i64>() {
        epoch
    } else {
        parse_relative(value, now)?
    };

    if !(-MAX_EPOCH_SECONDS..=MAX_EPOCH_SECONDS).contains(&time) {
        return Err(ApiError::Validation(format!(
            "time {} is out of range: {}",
            value, time
        )));
    }
    Ok(time)
}

fn parse_relative(value: &str, now: i64) -> ApiResult<i64> {
    let invalid = || ApiError::Validation(format!("unrecognized time: {}", value));
    let captures = relative_time_regex().captures(value).ok_or_else(invalid)?;
    let amount: i64 = captures[1].parse().map_err(|_| invalid())?;
    let unit = match &captures[2] {
        u if u.starts_with("mi") => 60,
        u if u.starts_with("mo") => 30 * 86_400,
        u if u.starts_with('s') => 1,
        u if u.starts_with('h') => 3_600,
        u if u.starts_with('d') => 86_400,
        u if u.starts_with('w') => 7 * 86_400,
        _ => 365 * 86_400,
    };

    amount
        .checked_mul(unit)
        .and_then(|offset| now.checked_sub(offset))
        .ok_or_else(invalid)
}
