//! Serde helpers for `U256` amounts encoded as decimal strings.
//!
//! `U256`'s `FromStr` impl parses hexadecimal, while the indexer and the
//! auction contract both speak decimal. This module is the single place that
//! bridges the two.

use primitive_types::U256;
use serde::{de, Deserialize, Deserializer, Serializer};
use serde_with::{DeserializeAs, SerializeAs};
use std::borrow::Cow;

/// `serde_as` adapter: `#[serde_as(as = "DecimalU256")]`.
pub struct DecimalU256;

impl<'de> DeserializeAs<'de, U256> for DecimalU256 {
    fn deserialize_as<D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize(deserializer)
    }
}

impl SerializeAs<U256> for DecimalU256 {
    fn serialize_as<S>(source: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize(source, serializer)
    }
}

pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Cow::<str>::deserialize(deserializer)?;
    U256::from_dec_str(&s)
        .map_err(|err| de::Error::custom(format!("{s:?} is not a decimal u256: {err}")))
}
