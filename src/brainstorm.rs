//! Angle brainstorming: one call per story, 4-5 distinct comedic angles.

use std::collections::HashSet;

use serde_json::Value;

use crate::gateway::{Attribution, GenerateRequest, ModelRoute, ProviderError, TextGateway};
use crate::prompts;
use crate::reply::extract_json;
use crate::types::{Angle, InspirationWord};

pub const MIN_ANGLES: usize = 4;
pub const MAX_ANGLES: usize = 5;

const BRAINSTORM_MAX_TOKENS: u32 = 1_024;
const BRAINSTORM_TEMPERATURE: f32 = 1.0;

pub fn clamp_angle_count(requested: usize) -> usize {
    requested.clamp(MIN_ANGLES, MAX_ANGLES)
}

/// Ask for `count` angles (clamped to 4-5). Fewer may come back; an empty
/// vec means the reply parsed but held nothing usable.
pub async fn brainstorm_angles(
    gateway: &dyn TextGateway,
    route: &ModelRoute,
    headline: &str,
    words: &[InspirationWord],
    count: usize,
    attribution: Attribution,
) -> Result<Vec<Angle>, ProviderError> {
    let count = clamp_angle_count(count);
    let prompt = prompts::brainstorm_prompt(headline, words, count);
    let raw = gateway
        .generate(GenerateRequest {
            route: route.clone(),
            messages: prompt.to_messages(),
            max_tokens: BRAINSTORM_MAX_TOKENS,
            temperature: BRAINSTORM_TEMPERATURE,
            attribution,
        })
        .await?;

    parse_angles(&raw, count)
}

/// Parse `{"angles": [{"name", "setup"}]}` or a bare array of names.
///
/// Names are deduplicated case-insensitively after trimming; the first
/// occurrence wins. At most `limit` angles are kept.
pub fn parse_angles(raw: &str, limit: usize) -> Result<Vec<Angle>, ProviderError> {
    let json = extract_json(raw).ok_or_else(|| ProviderError::parse("no JSON in reply", raw))?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ProviderError::parse(format!("invalid JSON: {e}"), raw))?;

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("angles") {
            Some(Value::Array(items)) => items,
            _ => return Err(ProviderError::parse("missing \"angles\" array", raw)),
        },
        _ => return Err(ProviderError::parse("expected object or array", raw)),
    };

    let mut seen = HashSet::new();
    let mut angles = Vec::new();
    for item in items {
        let angle = match item {
            Value::String(name) => Angle::new(name.trim(), ""),
            Value::Object(map) => {
                let field = |k: &str| {
                    map.get(k)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .unwrap_or("")
                        .to_string()
                };
                Angle::new(field("name"), field("setup"))
            }
            _ => continue,
        };
        if angle.name.is_empty() || !seen.insert(angle.name.to_lowercase()) {
            continue;
        }
        angles.push(angle);
        if angles.len() == limit {
            break;
        }
    }

    Ok(angles)
}
