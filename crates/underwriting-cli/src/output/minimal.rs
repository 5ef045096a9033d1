use serde_json::Value;

use super::{result_of, scalar_text};

/// Headline figure per command, first match wins.
const HEADLINE_KEYS: [&str; 8] = [
    "net_operating_income",
    "max_loan",
    "overall_pass",
    "overall_severity",
    "noi_variance_percent",
    "implied_value",
    "affordable_at_ami_percent",
    "indicated_value",
];

/// Print the single figure a command is usually run for.
pub fn print_minimal(value: &Value) {
    println!("{}", headline(value));
}

pub(crate) fn headline(value: &Value) -> String {
    let result = result_of(value);

    if let Value::Object(map) = result {
        // Sizing nests under `sizing`; compliance nests under `result`
        for scope in [Some(map), map.get("sizing").and_then(Value::as_object), map.get("result").and_then(Value::as_object)]
            .into_iter()
            .flatten()
        {
            for key in HEADLINE_KEYS {
                if let Some(val) = scope.get(key).filter(|v| !v.is_null()) {
                    return scalar_text(val, "null");
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, scalar_text(val, "null"));
        }
    }

    scalar_text(result, "null")
}
