//! YAML scalars that may be written as strings or numbers.

use std::{fmt, str::FromStr};

use alloy_core::primitives::U256;
use anyhow::Context;
use derive_more::{Deref, Display};
use serde::{Deserialize, Deserializer, Serialize, de};

/// A scalar YAML value kept in its textual form.
///
/// `salt: 1`, `salt: "0x01"` and `amount: "ether:1.5"` all deserialize into a `Scalar`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deref, Display, Serialize)]
pub struct Scalar(String);

impl Scalar {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Parse the value as an unsigned integer, accepting decimal or `0x`-prefixed hex.
    pub fn to_u256(&self) -> anyhow::Result<U256> {
        parse_u256(&self.0)
    }
}

/// Parse a decimal or `0x`-prefixed hex integer.
pub fn parse_u256(value: &str) -> anyhow::Result<U256> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str(value).with_context(|| format!("Invalid integer value: '{}'", value))
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ScalarVisitor;

        impl de::Visitor<'_> for ScalarVisitor {
            type Value = Scalar;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a string, number or boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
                Ok(Scalar::new(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
                Ok(Scalar(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

/// Deserialize a [`U256`] written as a YAML number or string.
pub fn deserialize_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let scalar = Scalar::deserialize(deserializer)?;
    scalar.to_u256().map_err(de::Error::custom)
}
