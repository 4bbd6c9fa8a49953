//! Tolerant JSON extraction for model output.
//!
//! Models wrap JSON in prose, code fences, or reasoning traces. The repair
//! pass peels those layers and fixes the most common syntactic damage
//! (trailing commas) before giving up.

use regex::Regex;
use serde::de::DeserializeOwned;

/// Parse strictly, then progressively repair.
pub fn parse_with_repair<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    match serde_json::from_str::<T>(raw) {
        Ok(v) => Ok(v),
        Err(first_err) => {
            let candidate = extract_json_candidate(raw);
            match serde_json::from_str::<T>(&candidate) {
                Ok(v) => Ok(v),
                Err(_) => {
                    let fixed = strip_trailing_commas(&candidate);
                    serde_json::from_str::<T>(&fixed).map_err(|_| first_err)
                }
            }
        }
    }
}

/// Peel think-blocks and fences, then take the outermost `{…}` span.
fn extract_json_candidate(raw: &str) -> String {
    let mut s = raw.to_string();

    if let Ok(re) = Regex::new(r"(?s)<think>.*?</think>") {
        s = re.replace_all(&s, "").into_owned();
    }
    if let Some(fenced) = extract_fenced(&s) {
        s = fenced;
    }
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => s[start..=end].to_string(),
        _ => s,
    }
}

fn extract_fenced(s: &str) -> Option<String> {
    let re = Regex::new(r"(?s)```(?:json)?\s*(.*?)```").ok()?;
    let caps = re.captures(s)?;
    Some(caps.get(1)?.as_str().trim().to_string())
}

/// Remove `,` directly before `}` or `]`, outside of strings.
fn strip_trailing_commas(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = s.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if matches!(next, Some('}') | Some(']')) {
                    // drop it
                } else {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}
