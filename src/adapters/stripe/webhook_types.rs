//! Stripe webhook envelope and signature header.
//!
//! The event envelope is parsed after the signature has been verified; the
//! embedded object stays a `serde_json::Value` until the event type says
//! what it is.

use serde::{Deserialize, Serialize};

use crate::ports::{InvoiceData, WebhookEvent, WebhookEventData, WebhookEventType};

use super::api_types::StripeInvoice;

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureParseError {
    /// Header is empty or missing.
    MissingHeader,
    /// Missing timestamp component (t=...).
    MissingTimestamp,
    /// Missing v1 signature component.
    MissingV1Signature,
    /// Invalid timestamp format.
    InvalidTimestamp,
    /// Invalid signature format (not valid hex).
    InvalidSignatureFormat,
}

impl std::fmt::Display for SignatureParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "Missing Stripe-Signature header"),
            Self::MissingTimestamp => write!(f, "Missing timestamp (t=) in signature"),
            Self::MissingV1Signature => write!(f, "Missing v1 signature in header"),
            Self::InvalidTimestamp => write!(f, "Invalid timestamp format"),
            Self::InvalidSignatureFormat => write!(f, "Invalid signature format (not valid hex)"),
        }
    }
}

impl std::error::Error for SignatureParseError {}

/// Parsed `Stripe-Signature` header: `t=<unix>,v1=<hex>[,v1=<hex>...]`.
///
/// Stripe sends one `v1` entry per active signing secret while a secret is
/// being rolled, so every `v1` value is kept. Other schemes are skipped.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Unix timestamp when Stripe signed the delivery.
    pub timestamp: i64,

    /// All v1 signatures (HMAC-SHA256, decoded from hex).
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.trim().is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };

            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    v1_signatures.push(
                        hex_decode(value.trim()).ok_or(SignatureParseError::InvalidSignatureFormat)?,
                    );
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureParseError::MissingTimestamp)?;
        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Lowercase hex encoding.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Raw Stripe webhook event as delivered.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type (e.g. "invoice.payment_succeeded").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    pub data: StripeEventData,

    /// Whether this is a live or test event.
    #[serde(default)]
    pub livemode: bool,

    pub api_version: Option<String>,

    #[serde(default)]
    pub pending_webhooks: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,

    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeWebhookEvent {
    /// Converts to the port event, decoding the invoice for invoice events.
    pub fn into_port_event(self) -> WebhookEvent {
        let event_type = WebhookEventType::from_provider(&self.event_type);

        let data = match event_type {
            WebhookEventType::InvoicePaymentSucceeded | WebhookEventType::InvoicePaymentFailed => {
                match serde_json::from_value::<StripeInvoice>(self.data.object.clone()) {
                    Ok(invoice) => WebhookEventData::Invoice(invoice.into()),
                    Err(e) => {
                        tracing::warn!(
                            event_id = %self.id,
                            error = %e,
                            "Invoice event object did not parse"
                        );
                        WebhookEventData::Raw {
                            json: self.data.object.to_string(),
                        }
                    }
                }
            }
            WebhookEventType::Other(_) => WebhookEventData::Raw {
                json: self.data.object.to_string(),
            },
        };

        WebhookEvent {
            id: self.id,
            event_type,
            data,
            created_at: self.created,
        }
    }
}

impl From<StripeInvoice> for InvoiceData {
    fn from(invoice: StripeInvoice) -> Self {
        let subscription_id = invoice.subscription_id();
        let period_end = invoice.period_end();

        InvoiceData {
            invoice_id: invoice.id,
            customer_id: invoice.customer,
            subscription_id,
            amount_paid: invoice.amount_paid,
            currency: invoice.currency,
            period_end,
            billing_reason: invoice.billing_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ════════════════════════════════════════════════════════════════════════════
    // SignatureHeader Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn parse_signature_header_valid() {
        let header = "t=1704067200,v1=5d41402abc4b2a76b9719d911017c592";
        let parsed = SignatureHeader::parse(header).unwrap();

        assert_eq!(parsed.timestamp, 1704067200);
        assert_eq!(parsed.v1_signatures.len(), 1);
        assert_eq!(
            hex_encode(&parsed.v1_signatures[0]),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn parse_signature_header_keeps_every_v1() {
        let header = "t=1704067200,v1=aabb,v0=ccdd,v1=eeff";
        let parsed = SignatureHeader::parse(header).unwrap();

        let encoded: Vec<_> = parsed.v1_signatures.iter().map(|s| hex_encode(s)).collect();
        assert_eq!(encoded, vec!["aabb", "eeff"]);
    }

    #[test]
    fn parse_signature_header_missing_timestamp() {
        let result = SignatureHeader::parse("v1=5d41402abc4b2a76b9719d911017c592");
        assert_eq!(result.unwrap_err(), SignatureParseError::MissingTimestamp);
    }

    #[test]
    fn parse_signature_header_missing_v1() {
        let result = SignatureHeader::parse("t=1704067200,v0=aabbccdd");
        assert_eq!(result.unwrap_err(), SignatureParseError::MissingV1Signature);
    }

    #[test]
    fn parse_signature_header_empty() {
        assert_eq!(
            SignatureHeader::parse("  ").unwrap_err(),
            SignatureParseError::MissingHeader
        );
    }

    #[test]
    fn parse_signature_header_invalid_timestamp() {
        let result = SignatureHeader::parse("t=not_a_number,v1=5d41");
        assert_eq!(result.unwrap_err(), SignatureParseError::InvalidTimestamp);
    }

    #[test]
    fn parse_signature_header_invalid_hex() {
        let result = SignatureHeader::parse("t=1704067200,v1=not_valid_hex_xyz");
        assert_eq!(result.unwrap_err(), SignatureParseError::InvalidSignatureFormat);

        let result = SignatureHeader::parse("t=1704067200,v1=abc");
        assert_eq!(result.unwrap_err(), SignatureParseError::InvalidSignatureFormat);
    }

    #[test]
    fn parse_signature_header_skips_garbage_segments() {
        let parsed = SignatureHeader::parse("junk,t=5,v1=00").unwrap();
        assert_eq!(parsed.timestamp, 5);
    }

    #[test]
    fn hex_encode_bytes() {
        assert_eq!(hex_encode(&[]), "");
        assert_eq!(hex_encode(&[0x00, 0xff, 0x10]), "00ff10");
    }

    proptest! {
        #[test]
        fn signature_parser_never_panics(header in "\\PC*") {
            let _ = SignatureHeader::parse(&header);
        }

        #[test]
        fn hex_decode_inverts_encode(bytes in proptest::collection::vec(any::<u8>(), 1..64)) {
            prop_assert_eq!(hex_decode(&hex_encode(&bytes)), Some(bytes));
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Event Conversion Tests
    // ════════════════════════════════════════════════════════════════════════════

    fn invoice_event_json(event_type: &str) -> String {
        format!(
            r#"{{
                "id": "evt_invoice",
                "type": "{}",
                "created": 1704067200,
                "data": {{
                    "object": {{
                        "id": "in_test_123",
                        "object": "invoice",
                        "customer": "cus_test_xyz",
                        "subscription": "sub_test_456",
                        "status": "paid",
                        "amount_paid": 0,
                        "amount_due": 0,
                        "currency": "usd",
                        "billing_reason": "subscription_create",
                        "lines": {{
                            "object": "list",
                            "data": [
                                {{
                                    "id": "il_1",
                                    "amount": 0,
                                    "period": {{ "start": 1704067200, "end": 1704672000 }}
                                }}
                            ]
                        }}
                    }}
                }},
                "livemode": false,
                "pending_webhooks": 1
            }}"#,
            event_type
        )
    }

    #[test]
    fn invoice_event_converts_to_invoice_data() {
        let event: StripeWebhookEvent =
            serde_json::from_str(&invoice_event_json("invoice.payment_succeeded")).unwrap();

        let port = event.into_port_event();

        assert_eq!(port.event_type, WebhookEventType::InvoicePaymentSucceeded);
        assert_eq!(port.created_at, 1704067200);
        match port.data {
            WebhookEventData::Invoice(invoice) => {
                assert_eq!(invoice.invoice_id, "in_test_123");
                assert_eq!(invoice.customer_id, "cus_test_xyz");
                assert_eq!(invoice.subscription_id.as_deref(), Some("sub_test_456"));
                assert_eq!(invoice.amount_paid, 0);
                assert_eq!(invoice.period_end, Some(1704672000));
                assert_eq!(invoice.billing_reason.as_deref(), Some("subscription_create"));
            }
            other => panic!("expected invoice data, got {:?}", other),
        }
    }

    #[test]
    fn other_event_keeps_raw_object() {
        let json = r#"{
            "id": "evt_cust",
            "type": "customer.created",
            "created": 1704067200,
            "data": { "object": { "id": "cus_1", "object": "customer" } },
            "livemode": false
        }"#;
        let event: StripeWebhookEvent = serde_json::from_str(json).unwrap();

        let port = event.into_port_event();

        assert_eq!(port.event_type.as_str(), "customer.created");
        assert!(matches!(port.data, WebhookEventData::Raw { .. }));
    }

    #[test]
    fn malformed_invoice_object_falls_back_to_raw() {
        let json = r#"{
            "id": "evt_bad",
            "type": "invoice.payment_failed",
            "created": 1704067200,
            "data": { "object": { "id": "in_1" } },
            "livemode": false
        }"#;
        let event: StripeWebhookEvent = serde_json::from_str(json).unwrap();

        let port = event.into_port_event();

        assert_eq!(port.event_type, WebhookEventType::InvoicePaymentFailed);
        assert!(matches!(port.data, WebhookEventData::Raw { .. }));
    }
}
