use serde_json::Value;

use super::Params;
use crate::ChangeRecord;
use crate::Resource;

/// True when `resource` has every `params` field at its required value.
///
/// Dotted names address nested fields. A string requirement also matches a
/// non-string field whose JSON text equals it, so `{"grain_rate.numerator":
/// "25"}` matches `25`.
pub fn resource_matches(
    params: &Params,
    resource: &Resource,
) -> bool {
    let value = resource.to_value();
    params.iter().all(|(field, expected)| field_matches(&value, field, expected))
}

/// An event passes when, field by field, either its pre or its post state
/// holds the required value. Transitions into and out of a filter are
/// therefore both delivered.
pub fn record_matches(
    params: &Params,
    record: &ChangeRecord,
) -> bool {
    if params.is_empty() {
        return true;
    }
    let pre = record.pre.as_ref().map(Resource::to_value);
    let post = record.post.as_ref().map(Resource::to_value);
    params.iter().all(|(field, expected)| {
        [&pre, &post]
            .into_iter()
            .flatten()
            .any(|value| field_matches(value, field, expected))
    })
}

fn field_matches(
    value: &Value,
    field: &str,
    expected: &Value,
) -> bool {
    let pointer = format!("/{}", field.replace('.', "/"));
    match (value.pointer(&pointer), expected) {
        (None, _) => false,
        (Some(actual), expected) if actual == expected => true,
        (Some(actual), Value::String(text)) => !actual.is_string() && actual.to_string() == *text,
        _ => false,
    }
}
