use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::record::SUBJECTS;
use serde_json::json;
use std::path::PathBuf;

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn path_param(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

fn handle_backup_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match path_param(req, "outPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let export = match state.store.export_bundle(&PathBuf::from(&out_path)) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{:#}", e),
                Some(json!({ "path": out_path })),
            )
        }
    };

    ok(
        &req.id,
        json!({
            "ok": true,
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "recordCount": export.record_count,
            "sha256": export.sha256
        }),
    )
}

fn handle_backup_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match path_param(req, "inPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    let import = match state.store.import_bundle(&src) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{:#}", e),
                Some(json!({ "path": in_path })),
            )
        }
    };

    ok(
        &req.id,
        json!({
            "ok": true,
            "recordsPath": state.store.path().to_string_lossy(),
            "bundleFormatDetected": import.bundle_format_detected,
            "recordCount": import.record_count
        }),
    )
}

fn handle_exchange_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match path_param(req, "outPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let records = match state.store.list() {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &e),
    };

    let mut csv = String::from("roll,name");
    for subject in SUBJECTS {
        csv.push(',');
        csv.push_str(subject);
    }
    csv.push_str(",total,percentage,grade\n");

    for r in &records {
        let marks: Vec<String> = r.marks.iter().map(|m| m.to_string()).collect();
        csv.push_str(&format!(
            "{},{},{},{},{:.1},{}\n",
            r.roll,
            csv_quote(&r.name),
            marks.join(","),
            r.total,
            r.percentage,
            csv_quote(r.grade.label())
        ));
    }

    let out = PathBuf::from(&out_path);
    if let Some(parent) = out.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": out_path })),
            );
        }
    }
    if let Err(e) = std::fs::write(&out, csv) {
        return err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": out_path })),
        );
    }

    ok(
        &req.id,
        json!({ "ok": true, "rowsExported": records.len(), "path": out_path }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportBundle" => Some(handle_backup_export_bundle(state, req)),
        "backup.importBundle" => Some(handle_backup_import_bundle(state, req)),
        "exchange.exportCsv" => Some(handle_exchange_export_csv(state, req)),
        _ => None,
    }
}
