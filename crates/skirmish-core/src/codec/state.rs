//! Observation tree and its conversion to/from transport JSON.
//!
//! Encoding walks mappings and sequences elementwise; only sonobuoys and
//! torpedoes get a fixed schema with a `type` discriminant. Decoding inspects
//! that discriminant with an exhaustive match and falls back to a structural
//! walk for anything it does not recognise, so unknown-but-harmless payloads
//! never break the protocol.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::objects::{SONOBUOY_TAG, Sonobuoy, TORPEDO_TAG, Torpedo};

const TYPE_FIELD: &str = "type";

/// A live observation as handed to (or received from) an agent.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Sonobuoy(Sonobuoy),
    Torpedo(Torpedo),
    Map(BTreeMap<String, StateValue>),
    List(Vec<StateValue>),
    /// Already transport-safe (number, string, bool, null, or opaque JSON).
    Plain(Value),
}

impl StateValue {
    /// Convenience constructor for a mapping from `(key, value)` pairs.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, StateValue)>) -> Self {
        StateValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        match self {
            StateValue::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            StateValue::Plain(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Sonobuoy> for StateValue {
    fn from(value: Sonobuoy) -> Self {
        StateValue::Sonobuoy(value)
    }
}

impl From<Torpedo> for StateValue {
    fn from(value: Torpedo) -> Self {
        StateValue::Torpedo(value)
    }
}

impl From<Value> for StateValue {
    fn from(value: Value) -> Self {
        StateValue::Plain(value)
    }
}

/// Live tree → transport JSON.
pub fn serialize(value: &StateValue) -> Value {
    match value {
        StateValue::Sonobuoy(sonobuoy) => tagged(sonobuoy, SONOBUOY_TAG),
        StateValue::Torpedo(torpedo) => tagged(torpedo, TORPEDO_TAG),
        StateValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), serialize(v)))
                .collect(),
        ),
        StateValue::List(items) => Value::Array(items.iter().map(serialize).collect()),
        StateValue::Plain(value) => value.clone(),
    }
}

/// Transport JSON → live tree. Never fails: unknown shapes pass through.
pub fn deserialize(value: Value) -> StateValue {
    match value {
        Value::Object(fields) => decode_object(fields),
        Value::Array(items) => StateValue::List(items.into_iter().map(deserialize).collect()),
        scalar => StateValue::Plain(scalar),
    }
}

/// Encode to the text that crosses the broker.
pub fn to_text(value: &StateValue) -> Result<String, serde_json::Error> {
    serde_json::to_string(&serialize(value))
}

/// Decode broker text. Only malformed JSON is an error; shapes are permissive.
pub fn from_text(text: &str) -> Result<StateValue, serde_json::Error> {
    serde_json::from_str(text).map(deserialize)
}

fn tagged<T: serde::Serialize>(object: &T, tag: &str) -> Value {
    // Both object structs only contain integers, strings and lists.
    let mut value = serde_json::to_value(object).unwrap_or(Value::Null);
    if let Value::Object(fields) = &mut value {
        fields.insert(TYPE_FIELD.to_string(), Value::String(tag.to_string()));
    }
    value
}

enum Kind {
    Sonobuoy,
    Torpedo,
    Other,
}

fn kind_of(fields: &Map<String, Value>) -> Kind {
    match fields.get(TYPE_FIELD).and_then(Value::as_str) {
        Some(SONOBUOY_TAG) => Kind::Sonobuoy,
        Some(TORPEDO_TAG) => Kind::Torpedo,
        _ => Kind::Other,
    }
}

fn decode_object(fields: Map<String, Value>) -> StateValue {
    let decoded = match kind_of(&fields) {
        Kind::Sonobuoy => schema::<Sonobuoy>(&fields).map(StateValue::Sonobuoy),
        Kind::Torpedo => schema::<Torpedo>(&fields).map(StateValue::Torpedo),
        Kind::Other => None,
    };
    decoded.unwrap_or_else(|| {
        StateValue::Map(
            fields
                .into_iter()
                .map(|(k, v)| (k, deserialize(v)))
                .collect(),
        )
    })
}

fn schema<T: serde::de::DeserializeOwned>(fields: &Map<String, Value>) -> Option<T> {
    let mut body = fields.clone();
    body.remove(TYPE_FIELD);
    match serde_json::from_value(Value::Object(body)) {
        Ok(object) => Some(object),
        Err(e) => {
            tracing::debug!(error = %e, "tagged object does not match its schema, passing through");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sonobuoy_strategy() -> impl Strategy<Value = Sonobuoy> {
        (
            proptest::option::of(-50i64..50),
            proptest::option::of(-50i64..50),
            0i64..10,
            "[A-Z]{3,5}",
            1i64..4,
        )
            .prop_map(|(col, row, range, state, size)| Sonobuoy {
                col,
                row,
                range,
                state,
                size,
            })
    }

    fn torpedo_strategy() -> impl Strategy<Value = Torpedo> {
        (
            proptest::option::of("[a-z0-9]{1,8}"),
            proptest::option::of(-50i64..50),
            proptest::option::of(-50i64..50),
            0i64..40,
            1i64..4,
            proptest::option::of(proptest::collection::vec(0i64..5, 0..4)),
            proptest::option::of(0i64..5),
        )
            .prop_map(|(id, col, row, turn, size, speed, search_radius)| Torpedo {
                id,
                col,
                row,
                turn,
                size,
                speed,
                search_radius,
            })
    }

    /// JSON without any `type` keys, i.e. already transport-safe.
    fn plain_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            "[a-zA-Z ]{0,6}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                proptest::collection::btree_map("[a-s]{1,4}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn sonobuoy_round_trips(s in sonobuoy_strategy()) {
            let decoded = deserialize(serialize(&StateValue::Sonobuoy(s.clone())));
            prop_assert_eq!(decoded, StateValue::Sonobuoy(s));
        }

        #[test]
        fn torpedo_round_trips(t in torpedo_strategy()) {
            let decoded = deserialize(serialize(&StateValue::Torpedo(t.clone())));
            prop_assert_eq!(decoded, StateValue::Torpedo(t));
        }

        #[test]
        fn transport_safe_values_are_unchanged(v in plain_json()) {
            prop_assert_eq!(serialize(&StateValue::Plain(v.clone())), v.clone());
            prop_assert_eq!(serialize(&deserialize(v.clone())), v);
        }
    }

    #[test]
    fn nested_objects_survive_the_text_boundary() {
        let state = StateValue::map([
            ("turn", StateValue::Plain(json!(3))),
            (
                "deployed_sonobuoy",
                StateValue::List(vec![Sonobuoy::new(3).into()]),
            ),
            (
                "deployed_torpedos",
                StateValue::List(vec![
                    Torpedo {
                        id: Some("t1".into()),
                        col: Some(2),
                        row: Some(4),
                        turn: 1,
                        size: 1,
                        speed: Some(vec![2, 2, 1]),
                        search_radius: Some(1),
                    }
                    .into(),
                ]),
            ),
        ]);
        let text = to_text(&state).unwrap();
        assert!(text.contains("\"type\":\"TORPEDO\""));
        assert!(text.contains("\"searchRadius\":1"));
        assert_eq!(from_text(&text).unwrap(), state);
    }

    #[test]
    fn unknown_or_missing_discriminants_pass_through() {
        let raw = json!({"type": "PANTHER", "col": 1, "nested": {"type": 7}});
        assert_eq!(serialize(&deserialize(raw.clone())), raw);
    }

    #[test]
    fn tagged_object_with_wrong_schema_passes_through() {
        let raw = json!({"type": "SONOBUOY", "range": "far"});
        let decoded = deserialize(raw.clone());
        assert!(matches!(decoded, StateValue::Map(_)));
        assert_eq!(serialize(&decoded), raw);
    }

    #[test]
    fn malformed_text_is_an_error() {
        assert!(from_text("{not json").is_err());
    }
}
