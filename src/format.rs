//! Plain-text formatters for results shown in scratch views.

use serde_json::Value;

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Query result as readable text: a row count followed by one block per
/// record, one `field: value` line each.
pub fn format_query_result(body: &Value) -> String {
    let records = body
        .get("records")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let total = body
        .get("totalSize")
        .and_then(Value::as_u64)
        .unwrap_or(records.len() as u64);

    let mut out = format!("Total rows: {}\n", total);
    for (i, record) in records.iter().enumerate() {
        out.push_str(&format!("\n--- Row {} ---\n", i + 1));
        if let Value::Object(map) = record {
            for (key, value) in map {
                if key == "attributes" {
                    continue;
                }
                out.push_str(&format!("{}: {}\n", key, value_text(value)));
            }
        }
    }
    out
}

/// Execute-anonymous result: compile state, then either the failure detail
/// or the success confirmation.
pub fn format_execute_anonymous(body: &Value) -> String {
    let compiled = body
        .get("compiled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let success = body
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut out = String::new();
    if !compiled {
        let line = body.get("line").and_then(Value::as_i64).unwrap_or(-1);
        let column = body.get("column").and_then(Value::as_i64).unwrap_or(-1);
        out.push_str("Compile failed\n");
        out.push_str(&format!(
            "Line {}, column {}: {}\n",
            line,
            column,
            body.get("compileProblem")
                .and_then(Value::as_str)
                .unwrap_or("unknown problem")
        ));
        return out;
    }
    if !success {
        out.push_str("Execution failed\n");
        if let Some(msg) = body.get("exceptionMessage").and_then(Value::as_str) {
            out.push_str(&format!("Exception: {}\n", msg));
        }
        if let Some(trace) = body.get("exceptionStackTrace").and_then(Value::as_str) {
            out.push_str(&format!("{}\n", trace));
        }
        return out;
    }
    out.push_str("Anonymous Apex executed successfully\n");
    out
}

/// Synchronous test-run result: totals first, then failures with stack
/// traces, then the passing methods.
pub fn format_test_result(body: &Value) -> String {
    let num_run = body.get("numTestsRun").and_then(Value::as_u64).unwrap_or(0);
    let num_failures = body.get("numFailures").and_then(Value::as_u64).unwrap_or(0);
    let failures = body
        .get("failures")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let successes = body
        .get("successes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut out = format!("Tests run: {}, failures: {}\n", num_run, num_failures);
    for failure in &failures {
        out.push_str(&format!(
            "\n[FAIL] {}.{}\n",
            failure.get("name").and_then(Value::as_str).unwrap_or("?"),
            failure
                .get("methodName")
                .and_then(Value::as_str)
                .unwrap_or("?")
        ));
        if let Some(message) = failure.get("message").and_then(Value::as_str) {
            out.push_str(&format!("  {}\n", message));
        }
        if let Some(trace) = failure.get("stackTrace").and_then(Value::as_str) {
            out.push_str(&format!("  {}\n", trace));
        }
    }
    for success in &successes {
        out.push_str(&format!(
            "[PASS] {}.{}\n",
            success.get("name").and_then(Value::as_str).unwrap_or("?"),
            success
                .get("methodName")
                .and_then(Value::as_str)
                .unwrap_or("?")
        ));
    }
    out
}

/// Field table of one sobject describe, aligned on the name column.
pub fn format_sobject_fields(body: &Value) -> String {
    let fields = body
        .get("fields")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let name_width = fields
        .iter()
        .filter_map(|f| f.get("name").and_then(Value::as_str))
        .map(str::len)
        .max()
        .unwrap_or(4)
        .max(4);

    let sobject = body
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let mut out = format!("{} fields ({})\n", sobject, fields.len());
    out.push_str(&format!(
        "{:<width$}  {:<12}  {:>6}  label\n",
        "name",
        "type",
        "length",
        width = name_width
    ));
    for field in &fields {
        out.push_str(&format!(
            "{:<width$}  {:<12}  {:>6}  {}\n",
            field.get("name").and_then(Value::as_str).unwrap_or(""),
            field.get("type").and_then(Value::as_str).unwrap_or(""),
            field.get("length").and_then(Value::as_u64).unwrap_or(0),
            field.get("label").and_then(Value::as_str).unwrap_or(""),
            width = name_width
        ));
    }
    out
}
