//! Webhook verification and dispatch.
//!
//! This module authenticates notifications sent by the aggregator and routes
//! them by event type.
//!
//! # Signature Scheme
//!
//! The aggregator signs each event with HMAC-SHA256 keyed by our API key and
//! sends the base64 digest in the `fuse-verification` header. The signed
//! message is the event serialized as JSON with every object's keys sorted,
//! exactly as a JavaScript signer produces it with `JSON.stringify` and a
//! key-sorting replacer. The canonical form must match byte for byte.

use std::cmp::Ordering;
use std::fmt::Write;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde_json::{Map, Number, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::models::webhook::{WebhookEvent, WebhookType};
use crate::services::fuse_client::FuseClient;

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook was refused. Both map to HTTP 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("verification header missing")]
    MissingHeader,
    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Checks that webhook events were signed with the aggregator API key.
#[derive(Clone)]
pub struct WebhookVerifier {
    key: Arc<[u8]>,
}

impl WebhookVerifier {
    pub fn new(api_key: &str) -> Self {
        Self {
            key: Arc::from(api_key.as_bytes()),
        }
    }

    /// Base64 HMAC-SHA256 of the canonical form of `event`.
    pub fn sign(&self, event: &Value) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(canonical_json(event).as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Verify `header` against `event`.
    ///
    /// A missing header is rejected before any digest is computed. The comparison
    /// is constant time; signatures of the wrong length are rejected outright.
    pub fn verify(&self, header: Option<&str>, event: &Value) -> Result<(), Rejection> {
        let provided = header.ok_or(Rejection::MissingHeader)?;
        let expected = self.sign(event);

        if expected.as_bytes().ct_eq(provided.as_bytes()).into() {
            Ok(())
        } else {
            Err(Rejection::SignatureMismatch)
        }
    }
}

/// Route a verified event.
///
/// Sync events are forwarded on a detached task together with the verification
/// header. The webhook response never waits on or reflects that call; its
/// failures are only logged.
pub fn dispatch(client: &FuseClient, verification: &str, body: Value) -> WebhookType {
    let event = WebhookEvent::from_body(&body);
    let connection = event.financial_connection_id.as_deref().unwrap_or("unknown");

    match event.kind {
        WebhookType::SyncData => {
            tracing::info!(financial_connection_id = connection, "Sync data webhook received");
            let client = client.clone();
            let verification = verification.to_string();
            let connection = connection.to_string();
            tokio::spawn(async move {
                match client
                    .sync_financial_connection_data(&verification, &body)
                    .await
                {
                    Ok(status) => tracing::info!(
                        financial_connection_id = %connection,
                        status = status.as_u16(),
                        "Financial connection sync requested"
                    ),
                    Err(e) => tracing::error!(
                        financial_connection_id = %connection,
                        "Failed to request financial connection sync: {}",
                        e
                    ),
                }
            });
        }
        WebhookType::Disconnected => {
            tracing::info!(
                financial_connection_id = connection,
                "Financial connection disconnected"
            );
        }
        WebhookType::Other => {
            tracing::debug!("Ignoring webhook without dedicated handling");
        }
    }

    event.kind
}

/// Serialize `value` the way the signer does.
///
/// - no whitespace
/// - object keys sorted at every depth, including objects inside arrays
/// - array order preserved
/// - numbers rendered like ECMAScript `Number.prototype.toString`
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value);
    out
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in sorted_entries(map).into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_canonical(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    // serde_json escapes exactly what JSON.stringify escapes for valid UTF-8
    out.push_str(&Value::String(s.to_string()).to_string());
}

/// Key order of a JavaScript object after sorting its keys.
///
/// Integer-like keys always enumerate first in ascending numeric order, whatever
/// order they were inserted in; the remaining keys follow in UTF-16 code unit order.
fn sorted_entries(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|(a, _), (b, _)| compare_keys(a, b));
    entries
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (array_index(a), array_index(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.encode_utf16().cmp(b.encode_utf16()),
    }
}

/// `Some(n)` if `key` is a canonical array index: digits only, no leading zero, below 2^32 - 1.
fn array_index(key: &str) -> Option<u32> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse::<u32>().ok().filter(|n| *n < u32::MAX)
}

/// Largest integer a JavaScript number holds exactly.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

fn write_number(out: &mut String, n: &Number) {
    if let Some(u) = n.as_u64().filter(|u| *u <= MAX_SAFE_INTEGER) {
        let _ = write!(out, "{u}");
    } else if let Some(i) = n.as_i64().filter(|i| i.unsigned_abs() <= MAX_SAFE_INTEGER) {
        let _ = write!(out, "{i}");
    } else if let Some(f) = n.as_f64() {
        write_js_double(out, f);
    } else {
        out.push_str("null");
    }
}

/// ECMAScript Number::toString(10) for a finite double.
fn write_js_double(out: &mut String, f: f64) {
    if !f.is_finite() {
        out.push_str("null");
        return;
    }
    if f == 0.0 {
        out.push('0');
        return;
    }
    if f < 0.0 {
        out.push('-');
    }

    // Shortest round-trip digits, e.g. "1.2345e-7"
    let sci = format!("{:e}", f.abs());
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };
    let k = digits.len() as i32;
    let n = exponent.parse::<i32>().unwrap_or(0) + 1;

    if k <= n && n <= 21 {
        out.push_str(digits);
        out.extend(std::iter::repeat_n('0', (n - k) as usize));
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        out.push_str(int);
        out.push('.');
        out.push_str(frac);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat_n('0', (-n) as usize));
        out.push_str(digits);
    } else {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let e = n - 1;
        let _ = write!(out, "e{}{}", if e >= 0 { "+" } else { "-" }, e.abs());
    }
}
