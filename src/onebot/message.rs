//! OneBot v11 message segments.
//!
//! Messages travel as arrays of `{"type": ..., "data": {...}}` objects. Only the
//! segment kinds the bot inspects are modelled; anything else is kept as
//! [`Segment::Other`] so it can round-trip.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// A single message segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSegment", into = "RawSegment")]
pub enum Segment {
    Text { text: String },
    /// `qq` is a QQ id, or `all` for @everyone.
    At { qq: String, name: Option<String> },
    Reply { id: String },
    Face { id: String },
    Image { file: String, url: Option<String> },
    /// Merged-forward message; the content has to be fetched by id.
    Forward { id: String },
    Other { kind: String, data: Value },
}

#[derive(Serialize, Deserialize)]
struct RawSegment {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Implementations disagree on whether ids are strings or numbers.
fn field_string(data: &Value, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl TryFrom<RawSegment> for Segment {
    type Error = String;

    fn try_from(raw: RawSegment) -> Result<Self, Self::Error> {
        let RawSegment { kind, data } = raw;
        let missing = |key: &str| format!("{} segment without '{}'", kind, key);

        let segment = match kind.as_str() {
            "text" => Segment::Text {
                text: field_string(&data, "text").unwrap_or_default(),
            },
            "at" => Segment::At {
                qq: field_string(&data, "qq").ok_or_else(|| missing("qq"))?,
                name: field_string(&data, "name"),
            },
            "reply" => Segment::Reply {
                id: field_string(&data, "id").ok_or_else(|| missing("id"))?,
            },
            "face" => Segment::Face {
                id: field_string(&data, "id").unwrap_or_default(),
            },
            "image" => Segment::Image {
                file: field_string(&data, "file").unwrap_or_default(),
                url: field_string(&data, "url"),
            },
            "forward" => Segment::Forward {
                id: field_string(&data, "id").ok_or_else(|| missing("id"))?,
            },
            _ => Segment::Other {
                kind: kind.clone(),
                data,
            },
        };
        Ok(segment)
    }
}

impl From<Segment> for RawSegment {
    fn from(segment: Segment) -> Self {
        let (kind, data) = match segment {
            Segment::Text { text } => ("text".to_string(), json!({ "text": text })),
            Segment::At { qq, name } => {
                let mut data = Map::new();
                data.insert("qq".to_string(), Value::String(qq));
                if let Some(name) = name {
                    data.insert("name".to_string(), Value::String(name));
                }
                ("at".to_string(), Value::Object(data))
            }
            Segment::Reply { id } => ("reply".to_string(), json!({ "id": id })),
            Segment::Face { id } => ("face".to_string(), json!({ "id": id })),
            Segment::Image { file, url } => {
                let mut data = Map::new();
                data.insert("file".to_string(), Value::String(file));
                if let Some(url) = url {
                    data.insert("url".to_string(), Value::String(url));
                }
                ("image".to_string(), Value::Object(data))
            }
            Segment::Forward { id } => ("forward".to_string(), json!({ "id": id })),
            Segment::Other { kind, data } => (kind, data),
        };
        RawSegment { kind, data }
    }
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text { text: text.into() }
    }

    pub fn at(qq_id: u64) -> Self {
        Segment::At {
            qq: qq_id.to_string(),
            name: None,
        }
    }
}

/// An ordered list of segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Message(pub Vec<Segment>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMessage {
    Segments(Vec<Segment>),
    /// `message_format: string` implementations send CQ-coded text.
    Text(String),
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match RawMessage::deserialize(deserializer)? {
            RawMessage::Segments(segments) => Message(segments),
            RawMessage::Text(text) => Message(vec![Segment::Text { text }]),
        })
    }
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, qq_id: u64) -> Self {
        self.0.push(Segment::at(qq_id));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.0.push(Segment::text(text));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn first(&self) -> Option<&Segment> {
        self.0.first()
    }

    /// Concatenation of the text segments only.
    pub fn text_content(&self) -> String {
        self.0
            .iter()
            .filter_map(|s| match s {
                Segment::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Ids of merged-forward segments.
    pub fn forward_ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|s| match s {
            Segment::Forward { id } => Some(id.as_str()),
            _ => None,
        })
    }
}

impl From<Vec<Segment>> for Message {
    fn from(segments: Vec<Segment>) -> Self {
        Message(segments)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            match segment {
                Segment::Text { text } => f.write_str(text)?,
                Segment::At { qq, name: Some(name) } => write!(f, "@{}({})", name, qq)?,
                Segment::At { qq, name: None } => write!(f, "@{}", qq)?,
                Segment::Reply { id } => write!(f, "[reply:{}]", id)?,
                Segment::Face { id } => write!(f, "[face:{}]", id)?,
                Segment::Image { .. } => f.write_str("[image]")?,
                Segment::Forward { id } => write!(f, "[forward:{}]", id)?,
                Segment::Other { kind, .. } => write!(f, "[{}]", kind)?,
            }
        }
        Ok(())
    }
}
