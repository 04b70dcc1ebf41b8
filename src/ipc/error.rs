use serde_json::json;

use crate::error::StoreError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn store_err(id: &str, e: &StoreError) -> serde_json::Value {
    let details = match e {
        StoreError::DuplicateKey(roll) | StoreError::NotFound(roll) => Some(json!({ "roll": roll })),
        StoreError::StorageRead { path, .. } => Some(json!({ "path": path.to_string_lossy() })),
        StoreError::StorageWrite {
            path,
            written,
            expected,
            ..
        } => Some(json!({
            "path": path.to_string_lossy(),
            "written": written,
            "expected": expected
        })),
        StoreError::InvalidInput(_) => None,
    };
    err(id, e.code(), e.to_string(), details)
}
