use crate::config::StoreConfig;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::record::SUBJECTS;
use crate::slot::SLOT_SIZE;
use crate::store::RecordStore;
use serde_json::json;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "recordsPath": state.config.records_path().to_string_lossy(),
            "slotSize": SLOT_SIZE,
            "subjects": SUBJECTS,
        }),
    )
}

fn handle_store_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match req.params.get("path").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing params.path", None),
    };

    let config = StoreConfig::at(&path);
    if config.records_path().is_dir() {
        return err(
            &req.id,
            "bad_params",
            "path is a directory, expected a records file",
            Some(json!({ "path": path })),
        );
    }

    // The candidate must be lockable and readable before the sidecar moves.
    let candidate = RecordStore::open(&config);
    match candidate.verify() {
        Ok(n) => {
            state.retarget(config);
            info!(path = %path, records = n, "records file selected");
            ok(
                &req.id,
                json!({ "recordsPath": path, "recordCount": n }),
            )
        }
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "store.open" => Some(handle_store_open(state, req)),
        _ => None,
    }
}
