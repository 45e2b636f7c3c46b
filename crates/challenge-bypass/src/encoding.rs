//! Shared base64 plumbing for the fixed-width wire encodings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::TokenError;

pub(crate) fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes `value` and checks it is exactly `expected` bytes long.
pub(crate) fn decode_exact(value: &str, expected: usize) -> Result<Vec<u8>, TokenError> {
    let bytes = STANDARD.decode(value).map_err(|_| TokenError::Base64)?;
    if bytes.len() != expected {
        return Err(TokenError::Length {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Implements string-based serde in terms of `encode_base64`/`decode_base64`.
macro_rules! impl_base64_serde {
    ($t:ty) => {
        impl serde::Serialize for $t {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.encode_base64())
            }
        }

        impl<'de> serde::Deserialize<'de> for $t {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let encoded = <String as serde::Deserialize>::deserialize(deserializer)?;
                Self::decode_base64(&encoded).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use impl_base64_serde;
