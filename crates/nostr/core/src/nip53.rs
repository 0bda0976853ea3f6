//! NIP-53: live activities (stream notes).
//!
//! A live stream is an addressable kind 30311 event republished by its host
//! whenever status or metadata changes, so consumers keep the newest event per
//! `(pubkey, d)` address.

use crate::nip01::Event;
use crate::tag_parsing::{collect_tag_values, find_tag_value, is_tag, parse_tag_value, tag_field};
use thiserror::Error;

/// Live event kind (addressable).
pub const KIND_LIVE_EVENT: u16 = 30311;

/// Live chat message kind.
pub const KIND_LIVE_CHAT_MESSAGE: u16 = 1311;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Nip53Error {
    #[error("invalid event kind: expected {expected}, got {actual}")]
    InvalidKind { expected: u16, actual: u16 },

    #[error("missing required tag: {0}")]
    MissingTag(&'static str),
}

/// Stream status from the `status` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStatus {
    Planned,
    Live,
    Ended,
}

impl LiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiveStatus::Planned => "planned",
            LiveStatus::Live => "live",
            LiveStatus::Ended => "ended",
        }
    }
}

impl std::str::FromStr for LiveStatus {
    type Err = Nip53Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(LiveStatus::Planned),
            "live" => Ok(LiveStatus::Live),
            "ended" => Ok(LiveStatus::Ended),
            _ => Err(Nip53Error::MissingTag("status")),
        }
    }
}

/// A `p` tag on a live event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveParticipant {
    pub pubkey: String,
    pub relay: Option<String>,
    /// Host, Speaker, Participant, ... as written by the host.
    pub role: Option<String>,
}

/// Decoded kind 30311 event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEvent {
    pub event_id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub identifier: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
    pub streaming: Option<String>,
    pub recording: Option<String>,
    /// Unknown status values decode as `None` instead of failing the event.
    pub status: Option<LiveStatus>,
    pub starts: Option<u64>,
    pub ends: Option<u64>,
    pub current_participants: Option<u64>,
    pub total_participants: Option<u64>,
    pub hashtags: Vec<String>,
    pub participants: Vec<LiveParticipant>,
}

impl LiveEvent {
    pub fn from_event(event: &Event) -> Result<Self, Nip53Error> {
        if event.kind != KIND_LIVE_EVENT {
            return Err(Nip53Error::InvalidKind {
                expected: KIND_LIVE_EVENT,
                actual: event.kind,
            });
        }

        let tags = &event.tags;
        let identifier = find_tag_value(tags, "d")
            .ok_or(Nip53Error::MissingTag("d"))?
            .to_string();
        let owned = |name: &str| find_tag_value(tags, name).map(str::to_string);

        let participants = tags
            .iter()
            .filter(|tag| is_tag(tag, "p"))
            .filter_map(|tag| {
                let pubkey = tag_field(tag, 1)?.to_string();
                Some(LiveParticipant {
                    pubkey,
                    relay: tag_field(tag, 2)
                        .filter(|relay| !relay.is_empty())
                        .map(str::to_string),
                    role: tag_field(tag, 3).map(str::to_string),
                })
            })
            .collect();

        Ok(Self {
            event_id: event.id.clone(),
            pubkey: event.pubkey.clone(),
            created_at: event.created_at,
            identifier,
            title: owned("title"),
            summary: owned("summary"),
            image: owned("image"),
            streaming: owned("streaming"),
            recording: owned("recording"),
            status: find_tag_value(tags, "status").and_then(|s| s.parse().ok()),
            starts: parse_tag_value(tags, "starts"),
            ends: parse_tag_value(tags, "ends"),
            current_participants: parse_tag_value(tags, "current_participants"),
            total_participants: parse_tag_value(tags, "total_participants"),
            hashtags: collect_tag_values(tags, "t"),
            participants,
        })
    }

    /// `30311:<pubkey>:<d>` address used by `a` tags.
    pub fn address(&self) -> String {
        format!("{}:{}:{}", KIND_LIVE_EVENT, self.pubkey, self.identifier)
    }

    /// Host pubkey: the participant tagged `host`, falling back to the author.
    pub fn host(&self) -> &str {
        self.participants
            .iter()
            .find(|p| p.role.as_deref().is_some_and(|r| r.eq_ignore_ascii_case("host")))
            .map_or(self.pubkey.as_str(), |p| p.pubkey.as_str())
    }

    pub fn is_live(&self) -> bool {
        self.status == Some(LiveStatus::Live)
    }
}
