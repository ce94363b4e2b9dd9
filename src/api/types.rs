//! Wire types for the save-code API.
//!
//! The endpoint takes a form-encoded body whose `arguments` field is itself a
//! JSON-serialized object; slot and log are carried as strings because that
//! is what the server expects.

use serde::{Deserialize, Serialize};

/// JSON object packed into the `arguments` form field.
#[derive(Debug, Clone, Serialize)]
pub struct SaveCodeArguments {
    pub slot: String,
    pub code: String,
    pub name: String,
    pub log: String,
}

impl SaveCodeArguments {
    pub fn new(name: &str, slot: u32, code: String) -> Self {
        Self {
            slot: slot.to_string(),
            code,
            name: name.to_string(),
            log: "0".to_string(),
        }
    }
}

/// One element of the JSON array the API responds with.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_serialize_with_stringified_slot() {
        let args = SaveCodeArguments::new("ranger", 1, "attack(target);".to_string());
        let json = serde_json::to_string(&args).unwrap();

        assert_eq!(
            json,
            r#"{"slot":"1","code":"attack(target);","name":"ranger","log":"0"}"#
        );
    }

    #[test]
    fn test_message_parses() {
        let parsed: Vec<ApiMessage> =
            serde_json::from_str(r#"[{"message":"Code Saved","type":"ui"}]"#).unwrap();
        assert_eq!(parsed[0].message, "Code Saved");
    }
}
