use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DeterministicError, DeterministicResult};

/// Seed configuration for deterministic mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicConfig {
    #[serde(default)]
    pub seed: u64,
}

/// Generation mode of a [`FunctionProvider`](crate::FunctionProvider).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Live,
    Deterministic { seed: u64 },
}

impl Mode {
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Self::Deterministic { .. })
    }

    /// Interpret the value stored under the `lix_deterministic_mode` key.
    ///
    /// Accepted forms are `{"enabled": bool, "seed": u64}` (both optional,
    /// `enabled` defaults to true), a bare boolean, or `null` for live mode.
    pub fn from_value(value: &Value) -> DeterministicResult<Self> {
        match value {
            Value::Null | Value::Bool(false) => Ok(Self::Live),
            Value::Bool(true) => Ok(Self::Deterministic { seed: 0 }),
            Value::Object(obj) => {
                let enabled = match obj.get("enabled") {
                    None => true,
                    Some(Value::Bool(b)) => *b,
                    Some(other) => return Err(DeterministicError::InvalidMode(other.to_string())),
                };
                if !enabled {
                    return Ok(Self::Live);
                }
                let seed = match obj.get("seed") {
                    None => 0,
                    Some(v) => v
                        .as_u64()
                        .ok_or_else(|| DeterministicError::InvalidMode(v.to_string()))?,
                };
                Ok(Self::Deterministic { seed })
            }
            other => Err(DeterministicError::InvalidMode(other.to_string())),
        }
    }

    /// The value form stored in the key-value entity.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Live => serde_json::json!({ "enabled": false }),
            Self::Deterministic { seed } => serde_json::json!({ "enabled": true, "seed": seed }),
        }
    }
}

impl From<Option<DeterministicConfig>> for Mode {
    fn from(config: Option<DeterministicConfig>) -> Self {
        match config {
            Some(c) => Self::Deterministic { seed: c.seed },
            None => Self::Live,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_forms() {
        assert_eq!(Mode::from_value(&json!(null)).unwrap(), Mode::Live);
        assert_eq!(Mode::from_value(&json!(true)).unwrap(), Mode::Deterministic { seed: 0 });
        assert_eq!(
            Mode::from_value(&json!({"enabled": true, "seed": 7})).unwrap(),
            Mode::Deterministic { seed: 7 }
        );
        assert_eq!(Mode::from_value(&json!({"enabled": false})).unwrap(), Mode::Live);
        assert!(Mode::from_value(&json!("yes")).is_err());
        assert!(Mode::from_value(&json!({"seed": -1})).is_err());
    }

    #[test]
    fn value_roundtrip() {
        let mode = Mode::Deterministic { seed: 99 };
        assert_eq!(Mode::from_value(&mode.to_value()).unwrap(), mode);
        assert_eq!(Mode::from_value(&Mode::Live.to_value()).unwrap(), Mode::Live);
    }
}
