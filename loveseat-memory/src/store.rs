//! In-memory emulation of the CouchDB endpoints used by the client.
//!
//! Databases hold documents with revision histories reduced to the current
//! revision, which is enough to reproduce the optimistic concurrency rules: writing
//! or deleting with a stale `_rev` answers `409 Conflict`.

use bytes::Bytes;
use futures::channel::mpsc::UnboundedSender;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::trace;
use uuid::Uuid;

use loveseat_core::{
    document::{ID_FIELD, REV_FIELD},
    transport::{HttpRequest, HttpResponse},
};

pub(crate) fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string())
}

pub(crate) fn error_response(status: u16, error: &str, reason: &str) -> HttpResponse {
    json_response(status, json!({ "error": error, "reason": reason }))
}

fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone)]
struct StoredDocument {
    revision: u64,
    rev: String,
    body: Map<String, Value>,
    deleted: bool,
}

impl StoredDocument {
    fn render(&self, id: &str) -> Value {
        let mut document = Map::new();
        document.insert(ID_FIELD.into(), Value::String(id.to_string()));
        document.insert(REV_FIELD.into(), Value::String(self.rev.clone()));
        if self.deleted {
            document.insert("_deleted".into(), Value::Bool(true));
        }
        document.extend(self.body.clone());

        Value::Object(document)
    }
}

#[derive(Debug, Clone)]
struct ChangeRecord {
    seq: u64,
    id: String,
}

/// The state of one database.
#[derive(Debug, Default)]
pub(crate) struct DatabaseState {
    documents: HashMap<String, StoredDocument>,
    changes: Vec<ChangeRecord>,
    last_seq: u64,
    subscribers: Vec<UnboundedSender<Bytes>>,
}

impl DatabaseState {
    fn info(&self, name: &str) -> Value {
        json!({
            "db_name": name,
            "doc_count": self.documents.values().filter(|d| !d.deleted).count(),
            "update_seq": self.last_seq,
        })
    }

    fn change_event(&self, record: &ChangeRecord, include_docs: bool) -> Option<Value> {
        let document = self.documents.get(&record.id)?;
        let mut event = json!({
            "seq": record.seq,
            "id": record.id,
            "changes": [{ "rev": document.rev }],
        });

        if document.deleted {
            event["deleted"] = Value::Bool(true);
        }
        if include_docs {
            event["doc"] = document.render(&record.id);
        }

        Some(event)
    }

    /// Returns the change events after `since`, oldest first.
    pub(crate) fn changes_since(&self, since: u64, include_docs: bool) -> Vec<Value> {
        self.changes
            .iter()
            .filter(|record| record.seq > since)
            .filter_map(|record| self.change_event(record, include_docs))
            .collect()
    }

    pub(crate) fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub(crate) fn subscribe(&mut self, subscriber: UnboundedSender<Bytes>) {
        self.subscribers.push(subscriber);
    }

    fn record_change(&mut self, id: &str) {
        self.last_seq += 1;
        self.changes.retain(|record| record.id != id);

        let record = ChangeRecord {
            seq: self.last_seq,
            id: id.to_string(),
        };

        if let Some(event) = self.change_event(&record, false) {
            let line = Bytes::from(format!("{event}\n"));
            // Receivers that were dropped close their feed.
            self.subscribers
                .retain(|subscriber| subscriber.unbounded_send(line.clone()).is_ok());
        }

        self.changes.push(record);
    }

    fn get_document(&self, id: &str) -> HttpResponse {
        match self.documents.get(id) {
            Some(document) if !document.deleted => json_response(200, document.render(id)),
            Some(_) => error_response(404, "not_found", "deleted"),
            None => error_response(404, "not_found", "missing"),
        }
    }

    fn put_document(&mut self, id: &str, body: Option<&Bytes>) -> HttpResponse {
        let parsed = body.and_then(|b| serde_json::from_slice::<Value>(b).ok());
        let Some(Value::Object(mut fields)) = parsed else {
            return error_response(400, "bad_request", "Document must be a JSON object");
        };

        let given_rev = match fields.remove(REV_FIELD) {
            Some(Value::String(rev)) => Some(rev),
            _ => None,
        };
        fields.remove(ID_FIELD);

        let revision = match self.documents.get(id) {
            Some(current) if !current.deleted => {
                if given_rev.as_deref() != Some(current.rev.as_str()) {
                    return error_response(409, "conflict", "Document update conflict.");
                }
                current.revision + 1
            }
            Some(current) => current.revision + 1,
            None if given_rev.is_some() => {
                return error_response(409, "conflict", "Document update conflict.");
            }
            None => 1,
        };

        let rev = format!("{revision}-{}", generate_id());
        self.documents.insert(
            id.to_string(),
            StoredDocument {
                revision,
                rev: rev.clone(),
                body: fields,
                deleted: false,
            },
        );
        self.record_change(id);

        json_response(201, json!({ "ok": true, "id": id, "rev": rev }))
    }

    fn delete_document(&mut self, id: &str, rev: Option<&str>) -> HttpResponse {
        let Some(current) = self.documents.get_mut(id).filter(|d| !d.deleted) else {
            return error_response(404, "not_found", "missing");
        };

        if rev != Some(current.rev.as_str()) {
            return error_response(409, "conflict", "Document update conflict.");
        }

        current.revision += 1;
        current.rev = format!("{}-{}", current.revision, generate_id());
        current.body.clear();
        current.deleted = true;
        let rev = current.rev.clone();
        self.record_change(id);

        json_response(200, json!({ "ok": true, "id": id, "rev": rev }))
    }
}

/// The state of the whole emulated server.
#[derive(Debug, Default)]
pub(crate) struct ServerState {
    pub(crate) databases: HashMap<String, DatabaseState>,
    pub(crate) requests: Vec<HttpRequest>,
}

impl ServerState {
    /// Dispatches a buffered request on its decoded path segments.
    pub(crate) fn handle(&mut self, request: &HttpRequest, segments: &[String]) -> HttpResponse {
        use loveseat_core::transport::Method::*;

        trace!(method = %request.method, ?segments, "in-memory request");

        match (request.method, segments) {
            (Get, []) => json_response(
                200,
                json!({ "couchdb": "Welcome", "vendor": { "name": "loveseat-memory" } }),
            ),
            (Get, [uuids]) if uuids == "_uuids" => {
                let count = request
                    .query_param("count")
                    .and_then(|c| c.parse::<usize>().ok())
                    .unwrap_or(1);
                let uuids: Vec<String> = (0..count).map(|_| generate_id()).collect();

                json_response(200, json!({ "uuids": uuids }))
            }
            (Put, [name]) => {
                if name.starts_with('_') || name.is_empty() {
                    return error_response(
                        400,
                        "illegal_database_name",
                        "Name must not begin with an underscore",
                    );
                }
                if self.databases.contains_key(name) {
                    return error_response(
                        412,
                        "file_exists",
                        "The database could not be created, the file already exists.",
                    );
                }
                self.databases.insert(name.clone(), DatabaseState::default());

                json_response(201, json!({ "ok": true }))
            }
            (Delete, [name]) => match self.databases.remove(name) {
                Some(_) => json_response(200, json!({ "ok": true })),
                None => error_response(404, "not_found", "Database does not exist."),
            },
            (Get | Head, [name]) => match self.databases.get(name) {
                Some(database) => json_response(200, database.info(name)),
                None => error_response(404, "not_found", "Database does not exist."),
            },
            (Get, [name, changes]) if changes == "_changes" => match self.databases.get(name) {
                Some(database) => {
                    let since = parse_since(request, database);
                    let include_docs = request.query_param("include_docs") == Some("true");
                    let limit = request
                        .query_param("limit")
                        .and_then(|l| l.parse::<usize>().ok())
                        .unwrap_or(usize::MAX);
                    let results: Vec<Value> = database
                        .changes_since(since, include_docs)
                        .into_iter()
                        .take(limit)
                        .collect();
                    let last_seq = results
                        .last()
                        .and_then(|event| event["seq"].as_u64())
                        .unwrap_or(since);

                    json_response(200, json!({ "results": results, "last_seq": last_seq }))
                }
                None => error_response(404, "not_found", "Database does not exist."),
            },
            (method, [name, id]) => {
                let Some(database) = self.databases.get_mut(name) else {
                    return error_response(404, "not_found", "Database does not exist.");
                };

                match method {
                    Get | Head => database.get_document(id),
                    Put => database.put_document(id, request.body.as_ref()),
                    Delete => database.delete_document(id, request.query_param("rev")),
                    Post => error_response(
                        405,
                        "method_not_allowed",
                        "Only GET,HEAD,PUT,DELETE allowed",
                    ),
                }
            }
            _ => error_response(404, "not_found", "missing"),
        }
    }
}

pub(crate) fn parse_since(request: &HttpRequest, database: &DatabaseState) -> u64 {
    match request.query_param("since") {
        Some("now") => database.last_seq(),
        Some(since) => since.parse().unwrap_or(0),
        None => 0,
    }
}
