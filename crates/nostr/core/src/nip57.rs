//! NIP-57: zap receipts.
//!
//! A receipt (kind 9735) is published by the recipient's LNURL server and
//! embeds the sender's zap request (kind 9734) as JSON in its `description`
//! tag. Validating the payment itself is out of scope; this only decodes.

use crate::nip01::Event;
use crate::tag_parsing::{find_tag_value, parse_tag_value};
use thiserror::Error;

pub const KIND_ZAP_REQUEST: u16 = 9734;
pub const KIND_ZAP_RECEIPT: u16 = 9735;

#[derive(Debug, Error)]
pub enum Nip57Error {
    #[error("invalid event kind: expected {expected}, got {actual}")]
    InvalidKind { expected: u16, actual: u16 },

    #[error("missing required tag: {0}")]
    MissingTag(&'static str),

    #[error("invalid zap request: {0}")]
    InvalidRequest(String),
}

/// Decoded zap receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZapReceipt {
    pub receipt_id: String,
    pub created_at: u64,
    pub bolt11: String,
    pub recipient: String,
    /// Pubkey of the zap request author, when the request is embedded.
    pub sender: Option<String>,
    pub zapped_event: Option<String>,
    /// `a` tag address, e.g. a live stream `30311:<pubkey>:<d>`.
    pub zapped_address: Option<String>,
    pub amount_msats: Option<u64>,
    /// Zap request content.
    pub comment: String,
}

impl ZapReceipt {
    pub fn from_event(event: &Event) -> Result<Self, Nip57Error> {
        if event.kind != KIND_ZAP_RECEIPT {
            return Err(Nip57Error::InvalidKind {
                expected: KIND_ZAP_RECEIPT,
                actual: event.kind,
            });
        }

        let tags = &event.tags;
        let bolt11 = find_tag_value(tags, "bolt11")
            .ok_or(Nip57Error::MissingTag("bolt11"))?
            .to_string();
        let recipient = find_tag_value(tags, "p")
            .ok_or(Nip57Error::MissingTag("p"))?
            .to_string();

        let request = match find_tag_value(tags, "description") {
            Some(description) if !description.is_empty() => Some(
                serde_json::from_str::<Event>(description)
                    .map_err(|e| Nip57Error::InvalidRequest(e.to_string()))?,
            ),
            _ => None,
        };
        if let Some(request) = &request
            && request.kind != KIND_ZAP_REQUEST
        {
            return Err(Nip57Error::InvalidRequest(format!(
                "expected kind {}, got {}",
                KIND_ZAP_REQUEST, request.kind
            )));
        }

        let amount_msats = request
            .as_ref()
            .and_then(|request| parse_tag_value::<u64>(&request.tags, "amount"))
            .or_else(|| bolt11_amount_msats(&bolt11));

        Ok(Self {
            receipt_id: event.id.clone(),
            created_at: event.created_at,
            sender: request
                .as_ref()
                .map(|request| request.pubkey.clone())
                .or_else(|| find_tag_value(tags, "P").map(str::to_string)),
            zapped_event: find_tag_value(tags, "e").map(str::to_string),
            zapped_address: find_tag_value(tags, "a").map(str::to_string),
            amount_msats,
            comment: request.map(|request| request.content).unwrap_or_default(),
            bolt11,
            recipient,
        })
    }

    pub fn amount_sats(&self) -> Option<u64> {
        self.amount_msats.map(|msats| msats / 1000)
    }
}

/// Amount encoded in the human-readable part of a BOLT11 invoice, in msats.
///
/// `lnbc2500u1...` is 2500 micro-BTC. Invoices without an amount return `None`.
pub fn bolt11_amount_msats(invoice: &str) -> Option<u64> {
    let invoice = invoice.trim().to_ascii_lowercase();
    let invoice = invoice.strip_prefix("lightning:").unwrap_or(&invoice);
    let hrp = &invoice[..invoice.rfind('1')?];
    let rest = hrp.strip_prefix("ln")?;
    let amount_start = rest.find(|c: char| c.is_ascii_digit())?;
    let amount = &rest[amount_start..];

    let (digits, multiplier) = match amount.chars().last()? {
        c if c.is_ascii_digit() => (amount, None),
        c => (&amount[..amount.len() - 1], Some(c)),
    };
    let value: u64 = digits.parse().ok()?;

    // 1 BTC = 100_000_000_000 msats.
    match multiplier {
        None => value.checked_mul(100_000_000_000),
        Some('m') => value.checked_mul(100_000_000),
        Some('u') => value.checked_mul(100_000),
        Some('n') => value.checked_mul(100),
        Some('p') => (value % 10 == 0).then_some(value / 10),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn zap_request(amount: Option<&str>) -> Event {
        let mut tags = vec![tag(&["p", &"b".repeat(64)])];
        if let Some(amount) = amount {
            tags.push(tag(&["amount", amount]));
        }
        Event {
            id: "3".repeat(64),
            pubkey: "c".repeat(64),
            created_at: 1_700_000_000,
            kind: KIND_ZAP_REQUEST,
            tags,
            content: "great stream".to_string(),
            sig: "4".repeat(128),
        }
    }

    fn receipt(description: Option<String>, bolt11: &str) -> Event {
        let mut tags = vec![
            tag(&["p", &"b".repeat(64)]),
            tag(&["a", "30311:abc:stream"]),
            tag(&["bolt11", bolt11]),
        ];
        if let Some(description) = description {
            tags.push(vec!["description".to_string(), description]);
        }
        Event {
            id: "5".repeat(64),
            pubkey: "d".repeat(64),
            created_at: 1_700_000_010,
            kind: KIND_ZAP_RECEIPT,
            tags,
            content: String::new(),
            sig: "6".repeat(128),
        }
    }

    #[test]
    fn bolt11_amounts() {
        assert_eq!(bolt11_amount_msats("lnbc2500u1pvjluezpp5"), Some(250_000_000));
        assert_eq!(bolt11_amount_msats("lnbc1m1pvjluez"), Some(100_000_000));
        assert_eq!(bolt11_amount_msats("lnbc20n1pvjluez"), Some(2_000));
        assert_eq!(bolt11_amount_msats("lnbc10p1pvjluez"), Some(1));
        assert_eq!(bolt11_amount_msats("LNBC1U1PVJLUEZ"), Some(100_000));
        assert_eq!(bolt11_amount_msats("lntb5u1pvjluez"), Some(500_000));
        assert_eq!(bolt11_amount_msats("lnbc1pvjluezpp5"), None);
        assert_eq!(bolt11_amount_msats("not an invoice"), None);
    }

    #[test]
    fn decodes_receipt_with_embedded_request() {
        let request = serde_json::to_string(&zap_request(Some("21000"))).unwrap();
        let event = receipt(Some(request), "lnbc210n1pvjluez");

        let zap = ZapReceipt::from_event(&event).unwrap();
        assert_eq!(zap.recipient, "b".repeat(64));
        assert_eq!(zap.sender, Some("c".repeat(64)));
        assert_eq!(zap.zapped_address.as_deref(), Some("30311:abc:stream"));
        assert_eq!(zap.amount_msats, Some(21_000));
        assert_eq!(zap.amount_sats(), Some(21));
        assert_eq!(zap.comment, "great stream");
    }

    #[test]
    fn falls_back_to_invoice_amount() {
        let request = serde_json::to_string(&zap_request(None)).unwrap();
        let zap = ZapReceipt::from_event(&receipt(Some(request), "lnbc210n1pvjluez")).unwrap();
        assert_eq!(zap.amount_msats, Some(21_000));

        let bare = ZapReceipt::from_event(&receipt(None, "lnbc1u1pvjluez")).unwrap();
        assert_eq!(bare.sender, None);
        assert_eq!(bare.amount_msats, Some(100_000));
        assert!(bare.comment.is_empty());
    }

    #[test]
    fn rejects_malformed_receipts() {
        let mut missing_bolt11 = receipt(None, "lnbc1u1x");
        missing_bolt11.tags.retain(|t| t[0] != "bolt11");
        assert!(matches!(
            ZapReceipt::from_event(&missing_bolt11),
            Err(Nip57Error::MissingTag("bolt11"))
        ));

        let garbage = receipt(Some("{not json".to_string()), "lnbc1u1x");
        assert!(matches!(
            ZapReceipt::from_event(&garbage),
            Err(Nip57Error::InvalidRequest(_))
        ));

        let mut note = receipt(None, "lnbc1u1x");
        note.kind = 1;
        assert!(matches!(
            ZapReceipt::from_event(&note),
            Err(Nip57Error::InvalidKind { .. })
        ));
    }
}
