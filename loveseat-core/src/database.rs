//! Document operations scoped to one database.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::{
    changes::{Changes, ChangesFeed, ChangesOptions},
    document::{Document, ID_FIELD, REV_FIELD},
    error::{LoveseatError, LoveseatResult},
    locator::{Locator, RequestOptions},
    server::UuidPool,
};

#[derive(Deserialize)]
struct PutResponse {
    id: String,
    rev: String,
}

/// Handle for one named database.
///
/// Obtained from [`Server::database`](crate::server::Server::database) or
/// [`Server::create_database`](crate::server::Server::create_database). The handle
/// shares the identifier pool of the server it came from.
#[derive(Clone, Debug)]
pub struct Database {
    name: String,
    locator: Locator,
    uuids: UuidPool,
}

impl Database {
    pub fn new(name: impl Into<String>, locator: Locator, uuids: UuidPool) -> Self {
        Self {
            name: name.into(),
            locator,
            uuids,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn uuids(&self) -> &UuidPool {
        &self.uuids
    }

    /// Stores the document under `id`, creating it or updating it in place.
    ///
    /// On success the document's `_id` and `_rev` are set from the server response;
    /// this is the only place a revision advances.
    ///
    /// # Errors
    ///
    /// Fails with HTTP 409 if the document exists and `_rev` is missing or stale.
    pub async fn put(&self, id: &str, document: &mut Document) -> LoveseatResult<()> {
        let response = self
            .locator
            .put(Some(id), RequestOptions::new().json(&document.to_value()))
            .await?
            .json::<PutResponse>()?;

        debug!(database = %self.name, id = %response.id, rev = %response.rev, "stored document");
        document.insert(ID_FIELD, response.id);
        document.insert(REV_FIELD, response.rev);

        Ok(())
    }

    /// Fetches the document stored under `id`.
    ///
    /// # Errors
    ///
    /// A missing document fails with HTTP 404, see [`LoveseatError::is_not_found`].
    pub async fn get(&self, id: &str) -> LoveseatResult<Document> {
        self.locator
            .get(Some(id), RequestOptions::new())
            .await?
            .json()
    }

    /// Deletes the current revision of the document stored under `id`.
    ///
    /// The document is fetched first to learn its revision.
    pub async fn delete(&self, id: &str) -> LoveseatResult<()> {
        let document = self.get(id).await?;
        let rev = document
            .rev()
            .ok_or_else(|| LoveseatError::InvalidResponse(format!("document {id} has no _rev")))?
            .to_string();

        self.delete_revision(id, &rev).await
    }

    /// Deletes the document only if `rev` is still its current revision.
    ///
    /// # Errors
    ///
    /// A stale revision fails with HTTP 409, see [`LoveseatError::is_conflict`].
    pub async fn delete_revision(&self, id: &str, rev: &str) -> LoveseatResult<()> {
        self.locator
            .delete(Some(id), RequestOptions::new().param("rev", rev))
            .await?;

        Ok(())
    }

    /// Returns `true` if a document is stored under `id`.
    ///
    /// Any failure status reads as `false`; only transport failures are returned as
    /// errors.
    pub async fn contains(&self, id: &str) -> LoveseatResult<bool> {
        match self.locator.head(Some(id), RequestOptions::new()).await {
            Ok(_) => Ok(true),
            Err(LoveseatError::Http { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Reads `/{database}/_changes`.
    ///
    /// A continuous feed is returned as an open [`ChangesFeed`]; every other feed
    /// type is returned as the decoded response body.
    pub async fn changes(&self, options: ChangesOptions) -> LoveseatResult<Changes> {
        if options.is_continuous() {
            return Ok(Changes::Continuous(self.continuous_changes(options).await?));
        }

        let body: Value = self
            .locator
            .get(Some("_changes"), options.into_request())
            .await?
            .json()?;

        Ok(Changes::Batch(body))
    }

    /// Opens a continuous changes feed, whatever feed type `options` names.
    pub async fn continuous_changes(&self, options: ChangesOptions) -> LoveseatResult<ChangesFeed> {
        let options = options.feed(crate::changes::Feed::Continuous);
        let body = self
            .locator
            .stream(Some("_changes"), options.into_request())
            .await?;

        Ok(ChangesFeed::new(body))
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Database name={}>", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ServerConfig,
        server::Server,
        test_support::ScriptedTransport,
        transport::Method,
    };
    use futures::StreamExt;
    use serde_json::json;

    fn database(transport: &ScriptedTransport) -> Database {
        Server::new(transport.clone(), &ServerConfig::default())
            .unwrap()
            .database("db")
    }

    #[tokio::test]
    async fn put_sets_id_and_rev() {
        let transport = ScriptedTransport::new();
        transport.respond(201, r#"{"ok":true,"id":"doc","rev":"1-abc"}"#);
        let database = database(&transport);

        let mut document: Document = [("name", "alice")].into_iter().collect();
        database.put("doc", &mut document).await.unwrap();

        assert_eq!(document.id(), Some("doc"));
        assert_eq!(document.rev(), Some("1-abc"));

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.url, "http://localhost:5984/db/doc");
        assert_eq!(request.body.as_deref(), Some(br#"{"name":"alice"}"#.as_slice()));
    }

    #[tokio::test]
    async fn delete_uses_current_revision() {
        let transport = ScriptedTransport::new();
        transport.respond(200, r#"{"_id":"doc","_rev":"2-def"}"#);
        transport.respond(200, r#"{"ok":true}"#);
        let database = database(&transport);

        database.delete("doc").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[1].method, Method::Delete);
        assert_eq!(requests[1].query_param("rev"), Some("2-def"));
    }

    #[tokio::test]
    async fn contains_downgrades_http_failures() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "");
        transport.respond(404, "");
        transport.respond(401, "");
        let database = database(&transport);

        assert!(database.contains("a").await.unwrap());
        assert!(!database.contains("b").await.unwrap());
        assert!(!database.contains("c").await.unwrap());
        assert_eq!(transport.requests()[0].method, Method::Head);
    }

    #[tokio::test]
    async fn batch_changes_return_body() {
        let transport = ScriptedTransport::new();
        transport.respond(200, r#"{"results":[],"last_seq":0}"#);
        let database = database(&transport);

        let changes = database.changes(ChangesOptions::new().since(0)).await.unwrap();

        assert_eq!(changes.into_batch(), Some(json!({"results": [], "last_seq": 0})));
        assert_eq!(transport.requests()[0].url, "http://localhost:5984/db/_changes");
        assert_eq!(transport.requests()[0].query_param("feed"), None);
    }

    #[tokio::test]
    async fn continuous_changes_stream_lines() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "\n{\"seq\":1}\n\n{\"seq\":2}\n");
        let database = database(&transport);

        let feed = database
            .changes(ChangesOptions::new().feed(crate::changes::Feed::Continuous))
            .await
            .unwrap()
            .into_feed()
            .unwrap();
        let events: Vec<Value> = feed.map(|event| event.unwrap()).collect().await;

        assert_eq!(events, vec![json!({"seq": 1}), json!({"seq": 2})]);
        assert_eq!(transport.requests()[0].query_param("feed"), Some("continuous"));
    }

    #[tokio::test]
    async fn raw_continuous_feed_param_streams() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "{\"seq\":1}\n");
        let database = database(&transport);

        let changes = database
            .changes(ChangesOptions::new().param("feed", "continuous"))
            .await
            .unwrap();
        let events: Vec<Value> = changes
            .into_feed()
            .unwrap()
            .map(|event| event.unwrap())
            .collect()
            .await;

        assert_eq!(events, vec![json!({"seq": 1})]);
        let request = &transport.requests()[0];
        assert_eq!(
            request.query,
            vec![("feed".to_string(), "continuous".to_string())]
        );
    }
}
