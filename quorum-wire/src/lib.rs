// Wire DTOs shared between the coordinator and the participant. Kept in
// their own crate (no dependency on either service) so both sides compile
// against exactly the same request/response shapes.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// An operation is opaque to the protocol except for its `type` tag; only
/// `SET` is currently defined (§3). Keeping it as a raw JSON value rather
/// than a closed Rust enum means the WAL's embedded op-json is byte-for-byte
/// whatever the client sent, and new tags can be added without touching any
/// protocol code.
pub type Op = Value;

pub fn op_is_set(op: &Op) -> bool {
    op.get("type")
        .and_then(Value::as_str)
        .map(|t| t.eq_ignore_ascii_case("SET"))
        .unwrap_or(false)
}

/// `key` must be present; `value` defaults to the empty string when absent
/// and is stringified when present but not itself a JSON string, matching
/// the reference's `str(op.get("value", ""))` coercion. A `SET` that voted
/// YES must always mutate the store on commit — silently dropping a
/// missing/non-string value would let a committed txid leave no trace.
pub fn op_key_value(op: &Op) -> Option<(&str, String)> {
    let key = op.get("key")?.as_str()?;
    let value = match op.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => String::new(),
    };
    Some((key, value))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Protocol {
    TwoPc,
    ThreePc,
}

impl Protocol {
    /// Parses the `protocol` field of `/tx/start`: case-insensitive, and
    /// anything other than exactly "3PC" defaults to 2PC.
    pub fn parse(s: Option<&str>) -> Protocol {
        match s {
            Some(s) if s.eq_ignore_ascii_case("3PC") => Protocol::ThreePc,
            _ => Protocol::TwoPc,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::TwoPc => "2PC",
            Protocol::ThreePc => "3PC",
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    Commit,
    Abort,
}

impl Decision {
    pub fn from_all_yes(all_yes: bool) -> Decision {
        if all_yes {
            Decision::Commit
        } else {
            Decision::Abort
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::Commit => "COMMIT",
            Decision::Abort => "ABORT",
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Vote {
    Yes,
    No,
    NoTimeout,
}

impl Vote {
    /// Interprets a participant's raw `vote` field, upper-cased (§4.1.1).
    /// Anything other than exactly "YES" is a plain NO; `NoTimeout` is
    /// reserved for transport-level failures and is never produced here.
    pub fn parse(s: &str) -> Vote {
        if s.eq_ignore_ascii_case("YES") {
            Vote::Yes
        } else {
            Vote::No
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, Vote::Yes)
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Vote::Yes => "YES",
            Vote::No => "NO",
            Vote::NoTimeout => "NO_TIMEOUT",
        })
    }
}

macro_rules! string_enum_serde {
    ($ty:ty, $parse:expr) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(&self.to_string())
            }
        }
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                struct V;
                impl<'de> Visitor<'de> for V {
                    type Value = $ty;
                    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str("a string")
                    }
                    fn visit_str<E: de::Error>(self, v: &str) -> Result<$ty, E> {
                        Ok($parse(v))
                    }
                }
                d.deserialize_str(V)
            }
        }
    };
}

string_enum_serde!(Vote, Vote::parse);
string_enum_serde!(Decision, |s: &str| if s.eq_ignore_ascii_case("COMMIT") {
    Decision::Commit
} else {
    Decision::Abort
});

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartTxRequest {
    pub txid: String,
    pub op: Op,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartTxResponse {
    pub ok: bool,
    pub txid: String,
    pub decision: Decision,
    pub votes: BTreeMap<String, Vote>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub txid: String,
    pub op: Op,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrepareResponse {
    pub vote: Vote,
    pub state: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxIdRequest {
    pub txid: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub const OK: OkResponse = OkResponse { ok: true };
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorStatusResponse {
    pub ok: bool,
    pub tx: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantStatusResponse {
    pub ok: bool,
    pub tx: BTreeMap<String, Value>,
    pub kv: BTreeMap<String, String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vote_roundtrips_as_string() {
        let v: Vote = serde_json::from_str("\"yes\"").unwrap();
        assert_eq!(v, Vote::Yes);
        assert_eq!(serde_json::to_string(&Vote::NoTimeout).unwrap(), "\"NO_TIMEOUT\"");
    }

    #[test]
    fn protocol_defaults_to_2pc() {
        assert_eq!(Protocol::parse(None), Protocol::TwoPc);
        assert_eq!(Protocol::parse(Some("2pc")), Protocol::TwoPc);
        assert_eq!(Protocol::parse(Some("3pc")), Protocol::ThreePc);
        assert_eq!(Protocol::parse(Some("bogus")), Protocol::TwoPc);
    }

    #[test]
    fn op_validation() {
        let set = serde_json::json!({"type": "SET", "key": "x", "value": "1"});
        assert!(op_is_set(&set));
        assert_eq!(op_key_value(&set), Some(("x", "1".to_string())));

        let del = serde_json::json!({"type": "DEL", "key": "x"});
        assert!(!op_is_set(&del));
    }

    #[test]
    fn op_key_value_defaults_missing_value_to_empty_string() {
        let set = serde_json::json!({"type": "SET", "key": "x"});
        assert_eq!(op_key_value(&set), Some(("x", String::new())));
    }

    #[test]
    fn op_key_value_stringifies_non_string_value() {
        let set = serde_json::json!({"type": "SET", "key": "x", "value": 5});
        assert_eq!(op_key_value(&set), Some(("x", "5".to_string())));
    }
}
