//! Serde glue for [`Schema`](../schema/struct.Schema.html).
//!
//! Schemas deserialize through `serde_json::Value`, because keyword
//! parsing needs the raw JSON shape (and unknown keywords must survive
//! untouched). Serialization writes the keywords back in their original
//! order.

use crate::schema::Schema;
use ::serde::de::{Deserialize, Deserializer};
use ::serde::ser::{Serialize, Serializer};
use serde_json::Value;

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Schema, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Schema::from_value(&value).map_err(::serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roundtrip_json() {
        let data = r#"{
  "$id": "https://example.com/widget",
  "type": "object",
  "properties": {
    "name": {
      "type": "string"
    },
    "tags": {
      "type": "array",
      "items": {
        "type": "string"
      }
    }
  },
  "required": [
    "name"
  ],
  "x-vendor": {
    "internal": true
  }
}"#;

        let parsed: Schema = serde_json::from_str(data).expect("failed to parse schema");
        let round_trip =
            serde_json::to_string_pretty(&parsed).expect("failed to serialize schema");
        assert_eq!(round_trip, data);
    }

    #[test]
    fn boolean_schemas_round_trip() {
        let parsed: Schema = serde_json::from_value(json!(false)).unwrap();
        assert_eq!(serde_json::to_value(&parsed).unwrap(), json!(false));
    }

    #[test]
    fn type_keeps_its_source_shape() {
        let singular: Schema = serde_json::from_value(json!({"type": "string"})).unwrap();
        assert_eq!(singular.to_value(), json!({"type": "string"}));

        let listed: Schema =
            serde_json::from_value(json!({"type": ["string", "null"]})).unwrap();
        assert_eq!(listed.to_value(), json!({"type": ["string", "null"]}));
    }
}
