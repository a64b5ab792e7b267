//! Base64 serde adapters for byte fields (standard alphabet, padded).

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Deserializer, Serializer, de::Error};

/// `Vec<u8>` as a base64 string
pub(crate) mod bytes {
    use super::{BASE64, Deserialize, Deserializer, Engine, Serializer, decode};

    pub(crate) fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(value))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        decode::<D>(&encoded)
    }
}

/// `[u8; N]` as a base64 string, length checked on decode
pub(crate) mod array {
    use super::{BASE64, Deserialize, Deserializer, Engine, Error, Serializer, decode};

    pub(crate) fn serialize<S: Serializer, const N: usize>(
        value: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(value))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = decode::<D>(&encoded)?;
        <[u8; N]>::try_from(bytes.as_slice())
            .map_err(|_| D::Error::custom(format!("expected {N} bytes, got {}", bytes.len())))
    }
}

fn decode<'de, D: Deserializer<'de>>(encoded: &str) -> Result<Vec<u8>, D::Error> {
    BASE64.decode(encoded).map_err(|err| D::Error::custom(format!("invalid base64: {err}")))
}
