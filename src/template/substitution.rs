//! Variable substitution engine for templates

use std::collections::HashMap;

/// Substitute `{{variable}}` placeholders in a pattern.
///
/// Replacement is literal token replacement; tokens without a matching
/// variable are left verbatim.
pub fn substitute(pattern: &str, variables: &HashMap<String, String>) -> String {
    let mut result = pattern.to_string();

    for (key, value) in variables {
        let token = format!("{{{{{}}}}}", key);
        result = result.replace(&token, value);
    }

    result
}

/// Flatten a JSON object into template variables.
///
/// Scalar values render naturally; arrays and objects fall back to their
/// JSON representation. Non-object inputs produce no variables.
pub fn variables_from_value(data: &serde_json::Value) -> HashMap<String, String> {
    let mut variables = HashMap::new();

    if let serde_json::Value::Object(map) = data {
        for (key, value) in map {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            variables.insert(key.clone(), rendered);
        }
    }

    variables
}
