//! Serde helpers for human-readable durations (`"500ms"`, `"2s"`, `"1m 30s"`).
//!
//! Plain integers are accepted as milliseconds so that JSON produced by scripts
//! can use numbers. Serialization always emits the humantime string form.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Accepted on-disk representations of a duration.
#[derive(Deserialize)]
#[serde(untagged)]
enum Helper {
    /// Humantime string.
    Text(String),
    /// Milliseconds.
    Millis(u64),
}

/// Convert a decoded helper into a `Duration`.
fn to_duration<E: serde::de::Error>(h: Helper) -> Result<Duration, E> {
    match h {
        Helper::Text(s) => humantime::parse_duration(s.trim())
            .map_err(|e| E::custom(format!("invalid duration {:?}: {}", s, e))),
        Helper::Millis(ms) => Ok(Duration::from_millis(ms)),
    }
}

/// Serialize a required duration.
pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&humantime::format_duration(*d).to_string())
}

/// Deserialize a required duration.
pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    to_duration(Helper::deserialize(d)?)
}

/// Optional variant used by attribute fields.
pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::{Helper, to_duration};

    /// Serialize an optional duration (`None` as unit).
    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&humantime::format_duration(*d).to_string()),
            None => s.serialize_none(),
        }
    }

    /// Deserialize an optional duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        match Option::<Helper>::deserialize(d)? {
            Some(h) => to_duration(h).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Timings {
        #[serde(with = "super")]
        every: Duration,
        #[serde(default, with = "super::option")]
        maybe: Option<Duration>,
    }

    #[test]
    fn parses_strings_and_millis() {
        let p: Timings = serde_json::from_str(r#"{"every": "1s 500ms", "maybe": 250}"#).unwrap();
        assert_eq!(p.every, Duration::from_millis(1500));
        assert_eq!(p.maybe, Some(Duration::from_millis(250)));

        let p: Timings = serde_json::from_str(r#"{"every": "2m"}"#).unwrap();
        assert_eq!(p.every, Duration::from_secs(120));
        assert_eq!(p.maybe, None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Timings>(r#"{"every": "soon"}"#).is_err());
    }

    #[test]
    fn serializes_humantime() {
        let p = Timings {
            every: Duration::from_millis(500),
            maybe: None,
        };
        let s = serde_json::to_string(&p).unwrap();
        assert_eq!(s, r#"{"every":"500ms","maybe":null}"#);
    }
}
