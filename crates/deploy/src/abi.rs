//! Type registry built from one or more contract ABIs.
//!
//! Top-level `...::Event` enums of every document are merged into a single
//! [`MERGED_EVENT_NAME`] enum so that one registry can label events emitted by a
//! contract and by the components and libraries it embeds.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use starknet::core::{types::Felt, utils::get_selector_from_name};

use crate::{
    cairo::{CairoDecodeError, decode_value},
    network::EmittedEvent,
};

/// Name suffix of a module's top-level event enum.
pub const TOP_LEVEL_EVENT_SUFFIX: &str = "::Event";
/// Name of the synthesized event enum.
pub const MERGED_EVENT_NAME: &str = "Event";

#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    #[error("malformed ABI document: {0}")]
    Malformed(String),

    #[error("unknown enum '{0}'")]
    UnknownEnum(String),

    #[error("enum '{name}' has no variant '{variant}'")]
    UnknownVariant { name: String, variant: String },

    #[error("invalid payload for variant '{variant}': {reason}")]
    Payload { variant: String, reason: String },

    #[error("no struct event matches selector {0:#x}")]
    UnknownEvent(Felt),

    #[error("failed to decode member '{member}': {source}")]
    Decode {
        member: String,
        #[source]
        source: CairoDecodeError,
    },
}

/// A named, typed field: a struct member or an enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// Event members and variants carry a kind (`key`, `data`, `nested`, `flat`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Struct,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEvent {
    pub name: String,
    /// Missing on events of pre-1.0 Cairo ABIs, which only list `keys` and `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EventKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<AbiField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<AbiField>,
}

impl AbiEvent {
    pub fn is_enum(&self) -> bool {
        self.kind == Some(EventKind::Enum)
    }
}

/// An ABI item. Items that define no type (functions, interfaces, impls...) are `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AbiItem {
    Struct { name: String, members: Vec<AbiField> },
    Enum { name: String, variants: Vec<AbiField> },
    Event(AbiEvent),
    #[serde(other)]
    Other,
}

impl AbiItem {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Struct { name, .. } | Self::Enum { name, .. } => Some(name),
            Self::Event(event) => Some(&event.name),
            Self::Other => None,
        }
    }

    fn top_level_event(&self) -> Option<&AbiEvent> {
        match self {
            Self::Event(event)
                if event.is_enum() && event.name.ends_with(TOP_LEVEL_EVENT_SUFFIX) =>
            {
                Some(event)
            }
            _ => None,
        }
    }
}

/// Named type definitions plus the merged event enum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AbiTypeRegistry {
    types: BTreeMap<String, AbiItem>,
    #[serde(skip)]
    selectors: HashMap<Felt, usize>,
}

impl AbiTypeRegistry {
    /// Build a registry from raw ABI documents.
    ///
    /// A document is either the ABI array itself or an object with an `abi` key, whose
    /// value may also be the ABI serialized as a JSON string (as in a class definition).
    pub fn build<'a>(documents: impl IntoIterator<Item = &'a Value>) -> Result<Self, AbiError> {
        let mut types = BTreeMap::new();
        let mut variants: Vec<AbiField> = Vec::new();
        let mut variant_index: HashMap<String, usize> = HashMap::new();

        for document in documents {
            for item in parse_document(document)? {
                if let Some(event) = item.top_level_event() {
                    for variant in &event.variants {
                        match variant_index.get(&variant.ty) {
                            Some(&i) => variants[i] = variant.clone(),
                            None => {
                                variant_index.insert(variant.ty.clone(), variants.len());
                                variants.push(variant.clone());
                            }
                        }
                    }
                } else if let Some(name) = item.name() {
                    types.insert(name.to_string(), item);
                }
            }
        }

        let selectors = variants
            .iter()
            .enumerate()
            .filter_map(|(i, variant)| {
                get_selector_from_name(&variant.name).ok().map(|s| (s, i))
            })
            .collect();

        types.insert(
            MERGED_EVENT_NAME.to_string(),
            AbiItem::Event(AbiEvent {
                name: MERGED_EVENT_NAME.to_string(),
                kind: Some(EventKind::Enum),
                members: Vec::new(),
                variants,
            }),
        );

        Ok(Self { types, selectors })
    }

    pub fn get(&self, name: &str) -> Option<&AbiItem> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Variants of the merged event enum.
    pub fn event_variants(&self) -> &[AbiField] {
        match self.types.get(MERGED_EVENT_NAME) {
            Some(AbiItem::Event(event)) => &event.variants,
            _ => &[],
        }
    }

    /// The merged event variant whose selector matches the event's first key.
    pub fn event_variant(&self, event: &EmittedEvent) -> Option<&AbiField> {
        let selector = event.keys.first()?;
        let index = *self.selectors.get(selector)?;
        self.event_variants().get(index)
    }

    /// Decode the data members of an event whose variant names a struct event.
    ///
    /// Returns `(member name, rendered value)` pairs in declaration order.
    pub fn decode_event_data(
        &self,
        event: &EmittedEvent,
    ) -> Result<Vec<(String, String)>, AbiError> {
        let unknown = || AbiError::UnknownEvent(event.keys.first().copied().unwrap_or(Felt::ZERO));
        let variant = self.event_variant(event).ok_or_else(unknown)?;
        let members = match self.types.get(&variant.ty) {
            Some(AbiItem::Event(found)) if !found.is_enum() => &found.members,
            _ => return Err(unknown()),
        };

        let mut data = event.data.as_slice();
        let mut decoded = Vec::new();
        for member in members.iter().filter(|m| m.kind.as_deref() == Some("data")) {
            let (value, used) =
                decode_value(&member.ty, data).map_err(|source| AbiError::Decode {
                    member: member.name.clone(),
                    source,
                })?;
            decoded.push((member.name.clone(), value));
            data = &data[used..];
        }
        Ok(decoded)
    }

    /// Encode an enum argument as `[variant_index, payload...]`.
    pub fn encode_enum(&self, enum_name: &str, arg: &EnumArg) -> Result<Vec<Felt>, AbiError> {
        let variants = match self.types.get(enum_name) {
            Some(AbiItem::Enum { variants, .. }) => variants,
            Some(AbiItem::Event(event)) if event.is_enum() => &event.variants,
            _ => return Err(AbiError::UnknownEnum(enum_name.to_string())),
        };
        let index = variants
            .iter()
            .position(|variant| variant.name == arg.kind)
            .ok_or_else(|| AbiError::UnknownVariant {
                name: enum_name.to_string(),
                variant: arg.kind.clone(),
            })?;

        let mut encoded = vec![Felt::from(index as u64)];
        encoded.extend(arg.payload_felts()?);
        Ok(encoded)
    }
}

fn parse_document(document: &Value) -> Result<Vec<AbiItem>, AbiError> {
    let abi = match document {
        Value::Object(map) => map
            .get("abi")
            .ok_or_else(|| AbiError::Malformed("object without an 'abi' key".to_string()))?,
        other => other,
    };

    let parsed = match abi {
        Value::String(raw) => serde_json::from_str(raw),
        other => serde_json::from_value(other.clone()),
    };
    parsed.map_err(|e| AbiError::Malformed(e.to_string()))
}

/// An enum value chosen by variant name, with an optional payload.
///
/// Accepts `"Variant"` or `{ "Variant": payload }` on input and always carries the
/// explicit `{ kind, payload }` shape afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumArg {
    pub kind: String,
    pub payload: Value,
}

impl EnumArg {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Read either accepted shape.
    pub fn from_value(value: Value) -> Result<Self, AbiError> {
        match value {
            Value::String(kind) => Ok(Self::new(kind, Value::Null)),
            Value::Object(map) if map.get("kind").is_some_and(Value::is_string) => {
                serde_json::from_value::<TaggedEnumArg>(Value::Object(map))
                    .map(|tagged| Self::new(tagged.kind, tagged.payload))
                    .map_err(|e| AbiError::Malformed(e.to_string()))
            }
            Value::Object(map) if map.len() == 1 => {
                let (kind, payload) = map
                    .into_iter()
                    .next()
                    .ok_or_else(|| AbiError::Malformed("empty enum object".to_string()))?;
                Ok(Self::new(kind, payload))
            }
            other => Err(AbiError::Malformed(format!(
                "expected a variant name or a single-key object, got {}",
                other
            ))),
        }
    }

    /// Payload as felts: nothing, a single felt, or an array of felts.
    pub fn payload_felts(&self) -> Result<Vec<Felt>, AbiError> {
        let to_felt = |value: &Value| -> Result<Felt, AbiError> {
            let invalid = |reason: String| AbiError::Payload {
                variant: self.kind.clone(),
                reason,
            };
            match value {
                Value::String(s) => Felt::from_hex(s)
                    .or_else(|_| Felt::from_dec_str(s))
                    .map_err(|e| invalid(format!("'{}': {}", s, e))),
                Value::Number(n) => n
                    .as_u64()
                    .map(Felt::from)
                    .ok_or_else(|| invalid(format!("{} is not an unsigned integer", n))),
                other => Err(invalid(format!("unsupported value {}", other))),
            }
        };

        match &self.payload {
            Value::Null => Ok(Vec::new()),
            Value::Object(map) if map.is_empty() => Ok(Vec::new()),
            Value::Array(items) => items.iter().map(to_felt).collect(),
            single => to_felt(single).map(|felt| vec![felt]),
        }
    }
}

#[derive(Deserialize)]
struct TaggedEnumArg {
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl<'de> Deserialize<'de> for EnumArg {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn erc20_abi() -> Value {
        serde_json::json!([
            { "type": "function", "name": "transfer", "inputs": [], "outputs": [],
              "state_mutability": "external" },
            { "type": "struct", "name": "core::integer::u256", "members": [
                { "name": "low", "type": "core::integer::u128" },
                { "name": "high", "type": "core::integer::u128" }
            ]},
            { "type": "event", "name": "token::erc20::Transfer", "kind": "struct", "members": [
                { "name": "from", "kind": "key",
                  "type": "core::starknet::contract_address::ContractAddress" },
                { "name": "value", "type": "core::integer::u256", "kind": "data" }
            ]},
            { "type": "event", "name": "token::erc20::Event", "kind": "enum", "variants": [
                { "name": "Transfer", "type": "token::erc20::Transfer", "kind": "nested" },
                { "name": "Approval", "type": "token::erc20::Approval", "kind": "nested" }
            ]}
        ])
    }

    fn ownable_abi() -> Value {
        serde_json::json!({
            "abi": [
                { "type": "enum", "name": "ownable::Role", "variants": [
                    { "name": "Owner", "type": "()" },
                    { "name": "Admin", "type": "core::felt252" }
                ]},
                { "type": "event", "name": "ownable::Event", "kind": "enum", "variants": [
                    { "name": "OwnershipTransferred", "kind": "nested",
                      "type": "ownable::OwnershipTransferred" },
                    { "name": "Transfer", "type": "token::erc20::Transfer", "kind": "nested" }
                ]}
            ]
        })
    }

    #[test]
    fn test_merges_top_level_events() {
        let registry = AbiTypeRegistry::build([&erc20_abi(), &ownable_abi()]).unwrap();

        let variants: Vec<_> = registry.event_variants().iter().map(|v| v.ty.as_str()).collect();
        assert_eq!(
            variants,
            vec![
                "token::erc20::Transfer",
                "token::erc20::Approval",
                "ownable::OwnershipTransferred"
            ]
        );

        assert!(registry.get("token::erc20::Event").is_none());
        assert!(registry.get("ownable::Event").is_none());
        assert!(registry.get("core::integer::u256").is_some());
        assert!(registry.get("token::erc20::Transfer").is_some());
        assert!(registry.get("ownable::Role").is_some());
        assert!(registry.get("transfer").is_none());
    }

    #[test]
    fn test_repeated_document_adds_no_variants() {
        let abi = erc20_abi();
        let once = AbiTypeRegistry::build([&abi]).unwrap();
        let twice = AbiTypeRegistry::build([&abi, &abi]).unwrap();
        assert_eq!(once.event_variants().len(), 2);
        assert_eq!(twice.event_variants(), once.event_variants());
        assert_eq!(twice.len(), once.len());
    }

    #[test]
    fn test_stringified_abi_is_accepted() {
        let document = serde_json::json!({ "abi": erc20_abi().to_string() });
        let registry = AbiTypeRegistry::build([&document]).unwrap();
        assert_eq!(registry.event_variants().len(), 2);
    }

    #[test]
    fn test_last_definition_wins() {
        let first = serde_json::json!([
            { "type": "struct", "name": "Point", "members": [{ "name": "x", "type": "felt" }] }
        ]);
        let second = serde_json::json!([
            { "type": "struct", "name": "Point", "members": [
                { "name": "x", "type": "felt" }, { "name": "y", "type": "felt" }
            ]}
        ]);
        let registry = AbiTypeRegistry::build([&first, &second]).unwrap();
        match registry.get("Point") {
            Some(AbiItem::Struct { members, .. }) => assert_eq!(members.len(), 2),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_legacy_event_without_kind() {
        let legacy = serde_json::json!([
            { "type": "event", "name": "Transfer", "keys": [], "data": [
                { "name": "from_", "type": "felt" },
                { "name": "to", "type": "felt" }
            ] }
        ]);
        let registry = AbiTypeRegistry::build([&legacy, &erc20_abi()]).unwrap();

        match registry.get("Transfer") {
            Some(AbiItem::Event(event)) => {
                assert_eq!(event.kind, None);
                assert!(!event.is_enum());
            }
            other => panic!("unexpected item: {other:?}"),
        }
        assert_eq!(registry.event_variants().len(), 2);
    }

    #[test]
    fn test_malformed_document() {
        let err = AbiTypeRegistry::build([&serde_json::json!({ "program": [] })]).unwrap_err();
        assert!(matches!(err, AbiError::Malformed(_)));
    }

    #[test]
    fn test_event_variant_by_selector() {
        let registry = AbiTypeRegistry::build([&erc20_abi()]).unwrap();
        let event = EmittedEvent {
            from_address: Felt::ONE,
            keys: vec![get_selector_from_name("Approval").unwrap()],
            data: vec![],
            block_hash: None,
            block_number: None,
            transaction_hash: Felt::ONE,
        };
        assert_eq!(
            registry.event_variant(&event).map(|v| v.ty.as_str()),
            Some("token::erc20::Approval")
        );

        let unknown = EmittedEvent {
            keys: vec![Felt::from(12345u64)],
            ..event
        };
        assert!(registry.event_variant(&unknown).is_none());
    }

    #[test]
    fn test_decode_event_data() {
        let registry = AbiTypeRegistry::build([&erc20_abi()]).unwrap();
        let transfer = EmittedEvent {
            from_address: Felt::ONE,
            keys: vec![get_selector_from_name("Transfer").unwrap(), Felt::from(0x11u64)],
            data: vec![Felt::from(500u64), Felt::ZERO],
            block_hash: None,
            block_number: Some(3),
            transaction_hash: Felt::TWO,
        };

        let decoded = registry.decode_event_data(&transfer).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].0, "value");
        assert!(decoded[0].1.ends_with("1f4"));

        let truncated = EmittedEvent {
            data: vec![Felt::from(500u64)],
            ..transfer.clone()
        };
        assert!(matches!(
            registry.decode_event_data(&truncated),
            Err(AbiError::Decode { ref member, .. }) if member == "value"
        ));

        // Approval is a variant, but its struct is not part of the document.
        let approval = EmittedEvent {
            keys: vec![get_selector_from_name("Approval").unwrap()],
            ..transfer
        };
        assert!(matches!(
            registry.decode_event_data(&approval),
            Err(AbiError::UnknownEvent(_))
        ));
    }

    #[test]
    fn test_enum_arg_shapes() {
        let bare: EnumArg = serde_json::from_value(serde_json::json!("Owner")).unwrap();
        assert_eq!(bare, EnumArg::new("Owner", Value::Null));

        let keyed: EnumArg =
            serde_json::from_value(serde_json::json!({ "Admin": "0x7" })).unwrap();
        assert_eq!(keyed, EnumArg::new("Admin", serde_json::json!("0x7")));

        let tagged = serde_json::json!({ "kind": "Admin", "payload": ["0x7"] });
        let tagged: EnumArg = serde_json::from_value(tagged).unwrap();
        assert_eq!(tagged.kind, "Admin");

        assert!(serde_json::from_value::<EnumArg>(serde_json::json!(3)).is_err());
        let ambiguous = serde_json::json!({ "A": 1, "B": 2 });
        assert!(serde_json::from_value::<EnumArg>(ambiguous).is_err());
    }

    #[test]
    fn test_encode_enum() {
        let registry = AbiTypeRegistry::build([&ownable_abi()]).unwrap();

        let owner = registry
            .encode_enum("ownable::Role", &EnumArg::new("Owner", Value::Null))
            .unwrap();
        assert_eq!(owner, vec![Felt::ZERO]);

        let admin = registry
            .encode_enum("ownable::Role", &EnumArg::new("Admin", serde_json::json!("0x7")))
            .unwrap();
        assert_eq!(admin, vec![Felt::ONE, Felt::from(7u64)]);

        let err = registry
            .encode_enum("ownable::Role", &EnumArg::new("Guest", Value::Null))
            .unwrap_err();
        assert!(matches!(err, AbiError::UnknownVariant { .. }));

        let err = registry
            .encode_enum("ownable::Missing", &EnumArg::new("Owner", Value::Null))
            .unwrap_err();
        assert!(matches!(err, AbiError::UnknownEnum(_)));
    }
}
