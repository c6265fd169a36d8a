use rocket::serde::json::{json, Json, Value};
use serde::Serialize;

/// The success envelope: `{"status": "success", ...payload}`.
pub type Success = Json<Value>;

/// A bare success envelope.
pub fn success() -> Success {
    Json(json!({ "status": "success" }))
}

/// A success envelope carrying `value` under `key`.
pub fn success_with<T: Serialize>(key: &str, value: T) -> Success {
    let mut body = json!({ "status": "success" });
    body[key] = json!(value);
    Json(body)
}

/// A success envelope with the fields of `value` merged in beside `status`.
/// `value` must serialize to a JSON object.
pub fn success_flat<T: Serialize>(value: T) -> Success {
    let mut body = json!({ "status": "success" });
    if let (Value::Object(body), Value::Object(fields)) = (&mut body, json!(value)) {
        body.extend(fields);
    }
    Json(body)
}
