//! Tolerant parsing for the balloon telemetry feed.
//!
//! The constellation endpoint intermittently serves broken JSON: bare `NaN`
//! tokens, trailing commas, and truncated bodies with unbalanced brackets.
//! A strict parse is tried first; on failure the body is rewritten into the
//! nearest valid document and parsed once more.

use serde_json::Value;

/// Parse a telemetry body, repairing known feed defects when strict parsing
/// fails. Returns `None` when the body is unrecoverable.
pub fn parse_lenient(body: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(body) {
        return Some(value);
    }
    serde_json::from_str(&repair(body)).ok()
}

/// Rewrite a malformed body:
/// - bare `NaN` tokens become `null` (kept distinguishable from real numbers
///   so the repair pipeline can decide what to substitute),
/// - commas dangling before a closing bracket or the end are dropped,
/// - a string cut off mid-value is terminated,
/// - unclosed brackets are closed in opening order,
/// - a body missing its outer brackets is wrapped in `[...]`.
fn repair(body: &str) -> String {
    let bytes = body.trim().as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len() + 8);
    let mut open_brackets: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if in_string {
            out.push(b);
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' => {
                in_string = true;
                out.push(b);
            }
            b'[' | b'{' => {
                open_brackets.push(b);
                out.push(b);
            }
            b']' | b'}' => {
                open_brackets.pop();
                out.push(b);
            }
            b',' => {
                // Drop a comma that sits right before a closer or the end.
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j < bytes.len() && bytes[j] != b']' && bytes[j] != b'}' {
                    out.push(b);
                }
            }
            b'N' if is_nan_token(bytes, i) => {
                out.extend_from_slice(b"null");
                i += 3;
                continue;
            }
            _ => out.push(b),
        }
        i += 1;
    }

    if in_string {
        out.push(b'"');
    }
    // A truncated body may end on a comma that the closers below would expose.
    while matches!(out.last(), Some(b',') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')) {
        out.pop();
    }
    while let Some(open) = open_brackets.pop() {
        out.push(if open == b'[' { b']' } else { b'}' });
    }

    let repaired = String::from_utf8_lossy(&out).into_owned();
    if repaired.starts_with('[') || repaired.starts_with('{') {
        repaired
    } else {
        format!("[{}]", repaired)
    }
}

/// True when `bytes[i..]` starts a standalone `NaN` token.
fn is_nan_token(bytes: &[u8], i: usize) -> bool {
    if !bytes[i..].starts_with(b"NaN") {
        return false;
    }
    let before_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
    let after_ok = bytes
        .get(i + 3)
        .is_none_or(|b| !b.is_ascii_alphanumeric());
    before_ok && after_ok
}
