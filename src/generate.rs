//! Headline generation: 2-3 rewrites of the source headline per angle.

use std::collections::HashSet;

use serde_json::Value;

use crate::gateway::{
    clean_headline_text, Attribution, GenerateRequest, ModelRoute, ProviderError, TextGateway,
};
use crate::prompts;
use crate::reply::{extract_json, strip_list_marker};
use crate::types::Angle;

pub const MAX_HEADLINES_PER_ANGLE: usize = 3;

const GENERATE_MAX_TOKENS: u32 = 256;
const GENERATE_TEMPERATURE: f32 = 1.1;

/// One generation call for one angle. Returns cleaned, distinct headline texts.
pub async fn generate_headlines(
    gateway: &dyn TextGateway,
    route: &ModelRoute,
    headline: &str,
    angle: &Angle,
    attribution: Attribution,
) -> Result<Vec<String>, ProviderError> {
    let prompt = prompts::generate_prompt(headline, angle, MAX_HEADLINES_PER_ANGLE);
    let raw = gateway
        .generate(GenerateRequest {
            route: route.clone(),
            messages: prompt.to_messages(),
            max_tokens: GENERATE_MAX_TOKENS,
            temperature: GENERATE_TEMPERATURE,
            attribution,
        })
        .await?;

    parse_headlines(&raw, MAX_HEADLINES_PER_ANGLE)
}

/// Parse `{"headlines": [...]}` or a bare JSON array; otherwise fall back to
/// one headline per non-empty line. Empty and duplicate entries are dropped.
pub fn parse_headlines(raw: &str, limit: usize) -> Result<Vec<String>, ProviderError> {
    let items: Vec<String> = match extract_json(raw).and_then(|j| serde_json::from_str(j).ok()) {
        Some(Value::Array(items)) => strings(&items),
        Some(Value::Object(map)) => match map.get("headlines") {
            Some(Value::Array(items)) => strings(items),
            _ => return Err(ProviderError::parse("missing \"headlines\" array", raw)),
        },
        _ => raw
            .lines()
            .map(strip_list_marker)
            .filter(|line| !line.ends_with(':') && !line.starts_with("```"))
            .filter(|line| !is_preamble(line))
            .map(str::to_string)
            .collect(),
    };

    let mut seen = HashSet::new();
    let headlines: Vec<String> = items
        .iter()
        .map(|s| clean_headline_text(s))
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .take(limit)
        .collect();

    if headlines.is_empty() && raw.trim().is_empty() {
        return Err(ProviderError::parse("empty reply", raw));
    }
    Ok(headlines)
}

/// Chatty lead-ins such as "Sure! Here are three headlines".
fn is_preamble(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    let interjection = ["sure", "okay", "ok", "certainly", "of course"]
        .iter()
        .any(|w| {
            lower
                .strip_prefix(w)
                .is_some_and(|rest| rest.starts_with(['!', ',', '.']))
        });
    let here = (lower.starts_with("here are ") || lower.starts_with("here's "))
        && lower.contains("headline");
    interjection || here
}

fn strings(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_object() {
        let raw = r#"{"headlines": ["Mayor Parks It", "\"Green Acres, Red Tape\""]}"#;
        let hs = parse_headlines(raw, 3).unwrap();
        assert_eq!(hs, ["Mayor Parks It", "Green Acres, Red Tape"]);
    }

    #[test]
    fn parses_bare_array_and_caps() {
        let raw = r#"["one", "two", "three", "four"]"#;
        assert_eq!(parse_headlines(raw, 3).unwrap(), ["one", "two", "three"]);
    }

    #[test]
    fn falls_back_to_lines() {
        let raw = "Here are three:\n1. Mayor Parks It\n\n- \"Swing Vote\"\n* mayor parks it\n";
        let hs = parse_headlines(raw, 3).unwrap();
        assert_eq!(hs, ["Mayor Parks It", "Swing Vote"]);
    }

    #[test]
    fn fallback_drops_chatty_lead_ins() {
        let raw = "Sure! Here are three headlines\nHere's a headline for you.\nMayor Parks It\nHere Comes The Zoning Board!\n";
        let hs = parse_headlines(raw, 3).unwrap();
        assert_eq!(hs, ["Mayor Parks It", "Here Comes The Zoning Board!"]);
    }

    #[test]
    fn wrong_object_shape_is_parse_error() {
        let err = parse_headlines(r#"{"titles": ["x"]}"#, 3).unwrap_err();
        assert_eq!(err.code(), "parse_error");
    }

    #[test]
    fn empty_reply_is_parse_error() {
        assert!(parse_headlines("   \n", 3).is_err());
        assert!(parse_headlines(r#"{"headlines": []}"#, 3).unwrap().is_empty());
    }
}
