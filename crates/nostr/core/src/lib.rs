//! Nostr protocol primitives shared by the relay pool client.
//!
//! - `nip01`: event model, hashing, signing and verification, kind 0 metadata
//! - `filter`: REQ filters and local matching
//! - `tag_parsing`: tag accessors used by every decoder
//! - `ordering`: dedup-by-id, latest-per-key and latest-version helpers for subscription consumers
//! - `nip53` / `nip57`: live stream and zap receipt decoding

pub mod filter;
pub mod nip01;
pub mod nip53;
pub mod nip57;
pub mod ordering;
pub mod tag_parsing;

pub use filter::{Filter, FilterError};
pub use nip01::{
    Event, EventTemplate, KIND_METADATA, KIND_SHORT_TEXT_NOTE, KindClassification, Metadata,
    Nip01Error, UnsignedEvent, classify_kind, finalize_event, generate_secret_key,
    get_event_hash, get_public_key_hex, validate_event, verify_event,
};
pub use nip53::{KIND_LIVE_EVENT, LiveEvent, LiveParticipant, LiveStatus, Nip53Error};
pub use nip57::{KIND_ZAP_RECEIPT, KIND_ZAP_REQUEST, Nip57Error, ZapReceipt, bolt11_amount_msats};
pub use ordering::{
    EventDeduper, address_key, latest_per_key, latest_versions, replacement_key, sort_by_recency,
    unique_by_id,
};
pub use tag_parsing::{collect_tag_values, find_tag, find_tag_value, get_tag};
