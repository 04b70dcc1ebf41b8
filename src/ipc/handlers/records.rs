use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::ordering::{SortDirection, SortKey};
use crate::record::{Grade, Marks, StudentRecord, SUBJECTS};
use crate::store::Mutation;
use serde_json::json;

fn roll_param(req: &Request) -> Result<i32, serde_json::Value> {
    let Some(raw) = req.params.get("roll").and_then(|v| v.as_i64()) else {
        return Err(err(&req.id, "bad_params", "missing roll", None));
    };
    i32::try_from(raw).map_err(|_| {
        err(
            &req.id,
            "bad_params",
            "roll must fit in a 32-bit signed integer",
            Some(json!({ "roll": raw })),
        )
    })
}

fn handle_records_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.store.list() {
        Ok(records) => ok(
            &req.id,
            json!({ "records": records, "subjects": SUBJECTS }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_exists(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roll = match roll_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.store.exists(roll) {
        Ok(exists) => ok(&req.id, json!({ "roll": roll, "exists": exists })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roll = match roll_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    let marks: Marks = match req
        .params
        .get("marks")
        .cloned()
        .map(serde_json::from_value)
    {
        Some(Ok(v)) => v,
        _ => {
            return err(
                &req.id,
                "bad_params",
                format!("marks must be an array of {} integers", SUBJECTS.len()),
                None,
            )
        }
    };

    // Duplicate roll is checked before mark ranges, inside the store.
    match state.store.create(StudentRecord::draft(roll, name, marks)) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roll = match roll_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.store.get(roll) {
        Ok(Some(record)) => ok(&req.id, json!({ "record": record })),
        Ok(None) => err(
            &req.id,
            "not_found",
            "student not found",
            Some(json!({ "roll": roll })),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let query = match req.params.get("query").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing query", None),
    };
    match state.store.search(&query) {
        Ok(records) => ok(&req.id, json!({ "records": records })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roll = match roll_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mutation: Mutation = match serde_json::from_value(req.params.clone()) {
        Ok(m) => m,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid update: {}", e),
                Some(json!({ "kinds": ["name", "marks", "mark"] })),
            )
        }
    };
    let mutation = match mutation {
        Mutation::Name { name } => Mutation::Name {
            name: name.trim().to_string(),
        },
        other => other,
    };

    match state.store.update(roll, &mutation) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roll = match roll_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.store.delete(roll) {
        Ok(record) => ok(&req.id, json!({ "deleted": record })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_sort(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key: SortKey = match req.params.get("key").cloned().map(serde_json::from_value) {
        Some(Ok(k)) => k,
        _ => {
            return err(
                &req.id,
                "bad_params",
                "key must be one of roll, name, percentage",
                None,
            )
        }
    };
    let direction: SortDirection = match req.params.get("direction").cloned() {
        None => SortDirection::default(),
        Some(v) => match serde_json::from_value(v) {
            Ok(d) => d,
            Err(_) => return err(&req.id, "bad_params", "direction must be asc or desc", None),
        },
    };
    let persist = req
        .params
        .get("persist")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    match state.store.sort(key, direction, persist) {
        Ok(records) => ok(
            &req.id,
            json!({ "records": records, "persisted": persist }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let stats = match state.store.stats() {
        Ok(s) => s,
        Err(e) => return store_err(&req.id, &e),
    };
    let by_grade: Vec<serde_json::Value> = Grade::ALL
        .into_iter()
        .map(|g| json!({ "grade": g.label(), "count": stats.counts.get(g) }))
        .collect();

    ok(
        &req.id,
        json!({
            "totalStudents": stats.total_students,
            "counts": stats.counts,
            "byGrade": by_grade,
            "top": stats.top,
            "lowest": stats.lowest,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.list" => Some(handle_records_list(state, req)),
        "records.exists" => Some(handle_records_exists(state, req)),
        "records.create" => Some(handle_records_create(state, req)),
        "records.get" => Some(handle_records_get(state, req)),
        "records.search" => Some(handle_records_search(state, req)),
        "records.update" => Some(handle_records_update(state, req)),
        "records.delete" => Some(handle_records_delete(state, req)),
        "records.sort" => Some(handle_records_sort(state, req)),
        "records.stats" => Some(handle_records_stats(state, req)),
        _ => None,
    }
}
