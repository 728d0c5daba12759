//! Typed records decoded from supervisord responses

use serde::Serialize;

use super::error::RpcError;
use super::xmlrpc::Value;

/// Result of `supervisor.getState`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorState {
    pub statecode: i64,
    pub statename: String,
}

impl SupervisorState {
    pub fn from_value(value: &Value) -> Result<Self, RpcError> {
        Ok(Self {
            statecode: value.get("statecode").and_then(Value::as_i64).unwrap_or_default(),
            statename: required_str(value, "statename")?,
        })
    }
}

/// Result of `supervisor.getProcessInfo`
///
/// Only `statename` is required; the remaining fields default when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub name: String,
    pub group: String,
    pub statename: String,
    pub state: i64,
    pub pid: i64,
    pub description: String,
    pub spawnerr: String,
    pub exitstatus: i64,
}

impl ProcessInfo {
    pub fn from_value(value: &Value) -> Result<Self, RpcError> {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let int = |key: &str| value.get(key).and_then(Value::as_i64).unwrap_or_default();

        Ok(Self {
            name: text("name"),
            group: text("group"),
            statename: required_str(value, "statename")?,
            state: int("state"),
            pid: int("pid"),
            description: text("description"),
            spawnerr: text("spawnerr"),
            exitstatus: int("exitstatus"),
        })
    }
}

fn required_str(value: &Value, key: &str) -> Result<String, RpcError> {
    match value.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(RpcError::malformed(format!("{} is not a string: {:?}", key, other))),
        None => Err(RpcError::malformed(format!("missing {}", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(members: &[(&str, Value)]) -> Value {
        Value::Struct(
            members
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_supervisor_state_from_value() {
        let value = record(&[("statecode", Value::Int(1)), ("statename", Value::from("RUNNING"))]);
        let state = SupervisorState::from_value(&value).unwrap();
        assert_eq!(state.statecode, 1);
        assert_eq!(state.statename, "RUNNING");
    }

    #[test]
    fn test_supervisor_state_requires_statename() {
        let value = record(&[("statecode", Value::Int(1))]);
        assert!(matches!(
            SupervisorState::from_value(&value),
            Err(RpcError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_process_info_defaults_optional_fields() {
        let value = record(&[
            ("name", Value::from("beacon_rx")),
            ("group", Value::from("epidose")),
            ("statename", Value::from("FATAL")),
            ("spawnerr", Value::from("Exited too quickly")),
        ]);
        let info = ProcessInfo::from_value(&value).unwrap();
        assert_eq!(info.name, "beacon_rx");
        assert_eq!(info.statename, "FATAL");
        assert_eq!(info.spawnerr, "Exited too quickly");
        assert_eq!(info.pid, 0);
        assert!(info.description.is_empty());
    }

    #[test]
    fn test_process_info_rejects_non_string_statename() {
        let value = record(&[("statename", Value::Int(20))]);
        assert!(ProcessInfo::from_value(&value).is_err());
    }

    #[test]
    fn test_non_struct_is_malformed() {
        assert!(SupervisorState::from_value(&Value::from("RUNNING")).is_err());
    }
}
