use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::error::ChannelError;

/// A decoded inbound frame.
///
/// Holds the `type` discriminator separately from the full object so routing never has to
/// look it up again. Handlers see the complete object, `type` included.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    msg_type: String,
    fields: Map<String, Value>,
}

impl Message {
    /// Decode a text frame.
    ///
    /// The frame must be a JSON object carrying a string `type` field.
    pub fn decode(text: &str) -> Result<Self, ChannelError> {
        let value: Value = serde_json::from_str(text).map_err(ChannelError::MessageParse)?;
        Self::from_value(value)
    }

    /// Build a message from an already parsed value.
    pub fn from_value(value: Value) -> Result<Self, ChannelError> {
        let Value::Object(fields) = value else {
            return Err(ChannelError::NotAnObject);
        };

        let msg_type = fields
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ChannelError::MissingType)?
            .to_owned();

        Ok(Self { msg_type, fields })
    }

    /// The `type` discriminator.
    #[must_use]
    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// Look up a top-level field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The conventional `status` field, if it is a string.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.get("status").and_then(Value::as_str)
    }

    /// The conventional `data` payload.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.get("data")
    }

    /// All top-level fields, `type` included.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Deserialize the whole object into a typed payload.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ChannelError> {
        T::deserialize(Value::Object(self.fields.clone())).map_err(|source| {
            ChannelError::PayloadMismatch {
                msg_type: self.msg_type.clone(),
                source,
            }
        })
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl TryFrom<Value> for Message {
    type Error = ChannelError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}
