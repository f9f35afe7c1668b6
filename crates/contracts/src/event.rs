//! Audit event list codec
//!
//! Structured view of the payload: an ordered list of audit events, each with
//! an optional string annotation map. Every member the forwarder does not
//! understand is kept as the raw JSON text it arrived in and written back
//! verbatim on encode, so numbers, nested objects and escapes survive untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::ProcessError;

/// API group of the audit event types
pub const AUDIT_API_GROUP: &str = "audit.k8s.io";

/// Kind of an audit event list
pub const EVENT_LIST_KIND: &str = "EventList";

/// Annotation map of a single event
pub type Annotations = BTreeMap<String, String>;

/// Pass-through JSON members in arrival order
#[derive(Debug, Clone, Default)]
pub struct RawFields(Vec<(String, Box<RawValue>)>);

impl RawFields {
    /// Raw JSON text of member `key`
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_ref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    fn push(&mut self, key: String, value: Box<RawValue>) {
        self.0.push((key, value));
    }
}

impl PartialEq for RawFields {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.get() == vb.get())
    }
}

/// Batch of audit events
#[derive(Debug, Clone, PartialEq)]
pub struct EventList {
    pub api_version: String,

    pub kind: String,

    /// Events, in the order they were received
    pub items: Vec<Event>,

    /// Pass-through members (`metadata`, ...)
    pub extra: RawFields,
}

/// Single audit event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    pub annotations: Option<Annotations>,

    /// Pass-through members (`auditID`, `verb`, `requestObject`, ...)
    pub extra: RawFields,
}

impl EventList {
    /// Decode an event list from its JSON encoding
    ///
    /// # Errors
    /// Fails on malformed JSON, a kind other than `EventList`, or an
    /// apiVersion outside the audit group.
    pub fn decode(data: &[u8]) -> Result<Self, ProcessError> {
        let list: Self = serde_json::from_slice(data).map_err(|e| ProcessError::Decode {
            message: format!("JSON parse error: {e}"),
            source: Some(Box::new(e)),
        })?;

        if list.kind != EVENT_LIST_KIND {
            return Err(ProcessError::decode(format!(
                "unexpected kind '{}', expected '{EVENT_LIST_KIND}'",
                list.kind
            )));
        }

        let group = list.api_version.split('/').next().unwrap_or_default();
        if group != AUDIT_API_GROUP || !list.api_version.contains('/') {
            return Err(ProcessError::decode(format!(
                "unsupported apiVersion '{}'",
                list.api_version
            )));
        }

        Ok(list)
    }

    /// Encode the event list to JSON
    pub fn encode(&self) -> Result<Vec<u8>, ProcessError> {
        serde_json::to_vec(self).map_err(|e| ProcessError::Encode {
            message: e.to_string(),
            source: Some(Box::new(e)),
        })
    }
}

impl Event {
    /// Annotation map, created if absent
    pub fn annotations_mut(&mut self) -> &mut Annotations {
        self.annotations.get_or_insert_with(Annotations::new)
    }

    /// Merge `annotations` into the event; given values win on conflicts
    pub fn merge_annotations(&mut self, annotations: &Annotations) {
        let target = self.annotations_mut();
        for (key, value) in annotations {
            target.insert(key.clone(), value.clone());
        }
    }
}

// 输出顺序与 apiserver 一致：kind, apiVersion, 透传字段, items
impl Serialize for EventList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.extra.len()))?;
        map.serialize_entry("kind", &self.kind)?;
        map.serialize_entry("apiVersion", &self.api_version)?;
        for (key, value) in self.extra.iter() {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("items", &self.items)?;
        map.end()
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in self.extra.iter() {
            map.serialize_entry(key, value)?;
        }
        if let Some(annotations) = &self.annotations {
            map.serialize_entry("annotations", annotations)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EventList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EventListVisitor)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EventVisitor)
    }
}

struct EventListVisitor;

impl<'de> Visitor<'de> for EventListVisitor {
    type Value = EventList;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an audit event list object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<EventList, A::Error> {
        let mut api_version: Option<String> = None;
        let mut kind: Option<String> = None;
        let mut items: Option<Option<Vec<Event>>> = None;
        let mut extra = RawFields::default();

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "apiVersion" => {
                    set_once::<_, A::Error>(&mut api_version, "apiVersion", map.next_value()?)?
                }
                "kind" => set_once::<_, A::Error>(&mut kind, "kind", map.next_value()?)?,
                "items" => set_once::<_, A::Error>(&mut items, "items", map.next_value()?)?,
                _ => {
                    let value = map.next_value()?;
                    extra.push(key, value);
                }
            }
        }

        Ok(EventList {
            api_version: api_version.ok_or_else(|| de::Error::missing_field("apiVersion"))?,
            kind: kind.ok_or_else(|| de::Error::missing_field("kind"))?,
            items: items.flatten().unwrap_or_default(),
            extra,
        })
    }
}

struct EventVisitor;

impl<'de> Visitor<'de> for EventVisitor {
    type Value = Event;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an audit event object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Event, A::Error> {
        let mut annotations: Option<Option<Annotations>> = None;
        let mut extra = RawFields::default();

        while let Some(key) = map.next_key::<String>()? {
            if key == "annotations" {
                set_once::<_, A::Error>(&mut annotations, "annotations", map.next_value()?)?;
            } else {
                let value = map.next_value()?;
                extra.push(key, value);
            }
        }

        Ok(Event {
            annotations: annotations.flatten(),
            extra,
        })
    }
}

fn set_once<T, E: de::Error>(slot: &mut Option<T>, field: &'static str, value: T) -> Result<(), E> {
    if slot.is_some() {
        return Err(E::duplicate_field(field));
    }
    *slot = Some(value);
    Ok(())
}
