//! Typed view over the multi-locale `fields` map of a payload.
//!
//! A raw payload carries `fields.<name>.<locale code> = value`. Values are
//! parsed into [`Field`] so the materializer walks a closed set of shapes
//! instead of probing JSON objects.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    Entry,
    Asset,
}

impl FromStr for LinkType {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Entry" => Ok(LinkType::Entry),
            "Asset" => Ok(LinkType::Asset),
            other => Err(FieldError::UnknownLinkType(other.to_string())),
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::Entry => f.write_str("Entry"),
            LinkType::Asset => f.write_str("Asset"),
        }
    }
}

/// Reference to another row by `contentful_id`. The target row is never
/// fetched at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReference {
    pub link_type: LinkType,
    pub contentful_id: String,
}

/// A single locale's value of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Field {
    Scalar(Value),
    Array(Vec<Field>),
    Link(LinkReference),
}

impl Field {
    /// Parses one locale value. Objects whose `sys.type` is `Link` must name
    /// a known `linkType`; every other object is kept verbatim as a scalar
    /// (locations, rich text, JSON fields).
    pub fn parse(value: &Value) -> Result<Field, FieldError> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(Field::parse)
                .collect::<Result<Vec<_>, _>>()
                .map(Field::Array),
            Value::Object(map) if is_link(map) => parse_link(map).map(Field::Link),
            other => Ok(Field::Scalar(other.clone())),
        }
    }

    pub fn as_link(&self) -> Option<&LinkReference> {
        match self {
            Field::Link(link) => Some(link),
            _ => None,
        }
    }
}

fn is_link(map: &Map<String, Value>) -> bool {
    map.get("sys")
        .and_then(|sys| sys.get("type"))
        .and_then(Value::as_str)
        == Some("Link")
}

fn parse_link(map: &Map<String, Value>) -> Result<LinkReference, FieldError> {
    let sys = map.get("sys").ok_or(FieldError::MalformedLink)?;
    let link_type = sys
        .get("linkType")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .parse::<LinkType>()?;
    let contentful_id = sys
        .get("id")
        .and_then(Value::as_str)
        .ok_or(FieldError::MalformedLink)?
        .to_string();

    Ok(LinkReference {
        link_type,
        contentful_id,
    })
}

/// `fields` of a payload, keyed by field name then locale code. Values are
/// kept raw until a locale is actually materialized.
#[derive(Debug, Clone, Default)]
pub struct LocalizedFields {
    fields: BTreeMap<String, BTreeMap<String, Value>>,
}

impl LocalizedFields {
    pub fn from_payload(payload: &Value) -> Self {
        let mut fields = BTreeMap::new();
        if let Some(map) = payload.get("fields").and_then(Value::as_object) {
            for (name, per_locale) in map {
                let Some(per_locale) = per_locale.as_object() else {
                    continue;
                };
                let values = per_locale
                    .iter()
                    .map(|(code, value)| (code.clone(), value.clone()))
                    .collect();
                fields.insert(name.clone(), values);
            }
        }
        Self { fields }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Raw value explicitly present for `code`. No fallback is applied.
    pub fn value(&self, name: &str, code: &str) -> Option<&Value> {
        self.fields.get(name).and_then(|per_locale| per_locale.get(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn link(link_type: &str, id: &str) -> Value {
        json!({ "sys": { "type": "Link", "linkType": link_type, "id": id } })
    }

    #[test]
    fn parses_scalars_arrays_and_links() {
        assert_eq!(Field::parse(&json!("hello")).unwrap(), Field::Scalar(json!("hello")));
        assert_eq!(
            Field::parse(&link("Asset", "img1")).unwrap(),
            Field::Link(LinkReference {
                link_type: LinkType::Asset,
                contentful_id: "img1".into()
            })
        );

        let parsed = Field::parse(&json!([link("Entry", "a"), link("Entry", "b")])).unwrap();
        let ids: Vec<_> = match parsed {
            Field::Array(items) => items
                .iter()
                .filter_map(|f| f.as_link().map(|l| l.contentful_id.clone()))
                .collect(),
            other => panic!("expected array, got {other:?}"),
        };
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn non_link_objects_stay_scalar() {
        let location = json!({ "lat": 1.0, "lon": 2.0 });
        assert_eq!(Field::parse(&location).unwrap(), Field::Scalar(location));
    }

    #[test]
    fn unknown_link_type_is_an_error() {
        assert_eq!(
            Field::parse(&link("Space", "x")),
            Err(FieldError::UnknownLinkType("Space".into()))
        );
        assert_eq!(
            Field::parse(&json!([link("Entry", "a"), link("Tag", "b")])),
            Err(FieldError::UnknownLinkType("Tag".into()))
        );
    }

    #[test]
    fn link_without_id_is_malformed() {
        let value = json!({ "sys": { "type": "Link", "linkType": "Entry" } });
        assert_eq!(Field::parse(&value), Err(FieldError::MalformedLink));
    }

    #[test]
    fn localized_fields_only_return_explicit_values() {
        let payload = json!({
            "fields": {
                "title": { "en-US": "Hello", "fr-FR": "Bonjour" },
                "slug": { "en-US": "hello" }
            }
        });
        let fields = LocalizedFields::from_payload(&payload);

        assert_eq!(fields.value("title", "fr-FR"), Some(&json!("Bonjour")));
        assert_eq!(fields.value("slug", "fr-FR"), None);
        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["slug", "title"]);
    }
}
