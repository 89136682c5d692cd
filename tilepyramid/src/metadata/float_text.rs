//! Float (de)serialization that survives NaN and infinities.
//!
//! JSON has no literal for non-finite numbers, so they are written as the
//! strings `"NaN"`, `"Infinity"` and `"-Infinity"`. Reading accepts either
//! a number or one of those strings (or any string that parses as a float).

use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum FloatRepr {
    Number(f64),
    Text(String),
}

impl FloatRepr {
    fn into_f64<E: de::Error>(self) -> Result<f64, E> {
        match self {
            FloatRepr::Number(v) => Ok(v),
            FloatRepr::Text(text) => parse_text(&text).ok_or_else(|| {
                E::invalid_value(de::Unexpected::Str(&text), &"a number, \"NaN\" or \"Infinity\"")
            }),
        }
    }
}

fn parse_text(text: &str) -> Option<f64> {
    match text.trim() {
        "NaN" | "nan" => Some(f64::NAN),
        "Infinity" | "inf" => Some(f64::INFINITY),
        "-Infinity" | "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

fn text_for(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("NaN")
    } else if value == f64::INFINITY {
        Some("Infinity")
    } else if value == f64::NEG_INFINITY {
        Some("-Infinity")
    } else {
        None
    }
}

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    match text_for(*value) {
        Some(text) => serializer.serialize_str(text),
        None => serializer.serialize_f64(*value),
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    FloatRepr::deserialize(deserializer)?.into_f64()
}

/// The same encoding applied to every element of a list.
pub mod vec {
    use super::*;

    struct Item(f64);

    impl serde::Serialize for Item {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            super::serialize(&self.0, serializer)
        }
    }

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&Item(*v))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<FloatRepr>::deserialize(deserializer)?
            .into_iter()
            .map(FloatRepr::into_f64)
            .collect()
    }
}

/// [`vec`] for an optional list; absent and `null` both read as `None`.
pub mod option_vec {
    use super::*;

    pub fn serialize<S: Serializer>(
        values: &Option<Vec<f64>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match values {
            Some(values) => super::vec::serialize(values, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<f64>>, D::Error> {
        Option::<Vec<FloatRepr>>::deserialize(deserializer)?
            .map(|items| items.into_iter().map(FloatRepr::into_f64).collect())
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "crate::metadata::float_text")]
        value: f64,
        #[serde(with = "crate::metadata::float_text::vec")]
        values: Vec<f64>,
    }

    #[test]
    fn test_non_finite_written_as_text() {
        let holder = Holder {
            value: f64::NAN,
            values: vec![f64::INFINITY, f64::NEG_INFINITY, 1.5],
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(
            json,
            r#"{"value":"NaN","values":["Infinity","-Infinity",1.5]}"#
        );
    }

    #[test]
    fn test_reads_numbers_and_text() {
        let holder: Holder =
            serde_json::from_str(r#"{"value":3,"values":["NaN","2.25",-1]}"#).unwrap();
        assert_eq!(holder.value, 3.0);
        assert!(holder.values[0].is_nan());
        assert_eq!(holder.values[1], 2.25);
        assert_eq!(holder.values[2], -1.0);
    }

    #[test]
    fn test_rejects_other_text() {
        let result: Result<Holder, _> = serde_json::from_str(r#"{"value":"lots","values":[]}"#);
        assert!(result.is_err());
    }
}
