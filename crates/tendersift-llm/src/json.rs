//! Best-effort JSON recovery from model output.

use serde_json::{Map, Value};

/// Parse the object spanning the first `{` to the last `}` of `raw`.
///
/// Commentary or code fences around the object are ignored. Returns `None`
/// when no braces are found, the span does not parse, or it is not an object.
pub fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let map = extract_json_object(r#"{"emd": "Rs. 5,000"}"#).unwrap();
        assert_eq!(map["emd"], "Rs. 5,000");
    }

    #[test]
    fn test_surrounding_commentary() {
        let raw = "Sure! Here is the JSON:\n```json\n{\"tender_id\": \"N/A\", \"projects\": []}\n```\nLet me know.";
        let map = extract_json_object(raw).unwrap();
        assert_eq!(map["tender_id"], "N/A");
        assert!(map["projects"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_failures_are_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
        assert!(extract_json_object("{\"a\": }").is_none());
        assert!(extract_json_object("").is_none());
    }
}
