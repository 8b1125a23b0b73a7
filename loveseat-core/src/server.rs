//! The root handle for a database server.
//!
//! A [`Server`] owns the root [`Locator`] and a [`UuidPool`] of server-generated
//! identifiers. Databases are addressed by name; creating or deleting them issues
//! `PUT /{name}` and `DELETE /{name}`.

use mea::mutex::Mutex;
use serde::Deserialize;
use std::{collections::VecDeque, fmt, sync::Arc};
use tracing::{debug, info};

use crate::{
    config::ServerConfig,
    database::Database,
    error::{LoveseatError, LoveseatResult},
    locator::{Locator, RequestOptions},
    transport::Transport,
};

#[derive(Deserialize)]
struct UuidsResponse {
    uuids: Vec<String>,
}

/// A refillable cache of identifiers fetched from `GET /_uuids?count=N`.
///
/// Clones share the same cache. The cache lock is held while a refill is in flight,
/// so concurrent callers wait for the batch instead of fetching their own, and no
/// identifier is handed out twice.
#[derive(Clone)]
pub struct UuidPool {
    locator: Locator,
    batch: usize,
    cache: Arc<Mutex<VecDeque<String>>>,
}

impl UuidPool {
    /// Creates an empty pool. `locator` is the server root.
    pub fn new(locator: &Locator, batch: usize) -> Self {
        Self {
            locator: locator.descend("_uuids"),
            batch: batch.max(1),
            cache: Arc::new(Mutex::new(VecDeque::with_capacity(batch))),
        }
    }

    /// Returns the number of identifiers fetched per refill.
    pub fn batch_size(&self) -> usize {
        self.batch
    }

    /// Returns how many identifiers are cached right now.
    pub async fn cached(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Pops the next identifier, refilling the cache first when it is empty.
    ///
    /// # Errors
    ///
    /// Propagates the transport or HTTP error of a failed refill, and reports
    /// [`LoveseatError::InvalidResponse`] if the server returns no identifiers.
    pub async fn next(&self) -> LoveseatResult<String> {
        let mut cache = self.cache.lock().await;

        if cache.is_empty() {
            debug!(count = self.batch, "refilling uuid cache");

            let response = self
                .locator
                .get(None, RequestOptions::new().param("count", self.batch))
                .await?
                .json::<UuidsResponse>()?;

            cache.extend(response.uuids);
        }

        cache
            .pop_front()
            .ok_or_else(|| LoveseatError::InvalidResponse("_uuids returned no identifiers".into()))
    }
}

impl fmt::Debug for UuidPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UuidPool")
            .field("locator", &self.locator)
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}

/// Handle for one database server.
#[derive(Clone, Debug)]
pub struct Server {
    host: String,
    port: u16,
    tls: bool,
    locator: Locator,
    uuids: UuidPool,
}

impl Server {
    /// Connects a server handle through the given transport. No request is made.
    ///
    /// # Errors
    ///
    /// Returns [`LoveseatError::Configuration`] if the configuration is invalid.
    pub fn new(transport: impl Transport + 'static, config: &ServerConfig) -> LoveseatResult<Self> {
        config.validate()?;

        let locator = Locator::new(config.base_url(), transport)
            .with_credentials(config.username.as_deref(), config.password.as_deref());
        let uuids = UuidPool::new(&locator, config.uuid_cache_size);

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            tls: config.tls,
            locator,
            uuids,
        })
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn uuids(&self) -> &UuidPool {
        &self.uuids
    }

    /// Pops a server-generated identifier from the pool.
    pub async fn next_uuid(&self) -> LoveseatResult<String> {
        self.uuids.next().await
    }

    /// Addresses a database by name without checking that it exists.
    pub fn database(&self, name: &str) -> Database {
        Database::new(name, self.locator.descend(name), self.uuids.clone())
    }

    /// Creates the database on the server and returns its handle.
    ///
    /// # Errors
    ///
    /// Fails with HTTP 412 if the database already exists.
    pub async fn create_database(&self, name: &str) -> LoveseatResult<Database> {
        let database = self.database(name);
        database.locator().put(None, RequestOptions::new()).await?;
        info!(database = name, "created database");

        Ok(database)
    }

    /// Deletes the database and every document in it.
    pub async fn delete_database(&self, name: &str) -> LoveseatResult<()> {
        self.locator.delete(Some(name), RequestOptions::new()).await?;
        info!(database = name, "deleted database");

        Ok(())
    }

    /// Returns `true` if `HEAD /{name}` succeeds. A failure status reads as `false`.
    pub async fn exists(&self, name: &str) -> LoveseatResult<bool> {
        match self.locator.head(Some(name), RequestOptions::new()).await {
            Ok(_) => Ok(true),
            Err(LoveseatError::Http { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Server host={} port={} username={} ssl={}>",
            self.host,
            self.port,
            self.locator.username().unwrap_or("None"),
            self.tls,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;

    fn server(transport: &ScriptedTransport, batch: usize) -> Server {
        Server::new(
            transport.clone(),
            &ServerConfig::default().with_uuid_cache_size(batch),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn refills_once_per_batch() {
        let transport = ScriptedTransport::new();
        transport.respond(200, r#"{"uuids": ["a", "b", "c"]}"#);
        transport.respond(200, r#"{"uuids": ["d", "e", "f"]}"#);
        let server = server(&transport, 3);

        let mut issued = Vec::new();
        for _ in 0..4 {
            issued.push(server.next_uuid().await.unwrap());
        }

        assert_eq!(issued, vec!["a", "b", "c", "d"]);
        assert_eq!(server.uuids().cached().await, 2);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, "http://localhost:5984/_uuids");
        assert_eq!(requests[0].query_param("count"), Some("3"));
    }

    #[tokio::test]
    async fn failed_refill_surfaces_error() {
        let transport = ScriptedTransport::new();
        transport.respond(500, r#"{"error":"boom"}"#);
        transport.respond(200, r#"{"uuids": []}"#);
        let server = server(&transport, 2);

        let err = server.next_uuid().await.unwrap_err();
        assert_eq!(err.status(), Some(500));

        let err = server.next_uuid().await.unwrap_err();
        assert!(matches!(err, LoveseatError::InvalidResponse(_)));
    }

    #[test]
    fn display_hides_password() {
        let transport = ScriptedTransport::new();
        let config = ServerConfig::new("couch", 6984)
            .with_credentials("admin", "hunter2")
            .with_tls(true);
        let server = Server::new(transport, &config).unwrap();

        assert_eq!(server.to_string(), "<Server host=couch port=6984 username=admin ssl=true>");
        assert_eq!(server.locator().base(), "https://couch:6984");
        assert!(!format!("{server:?}").contains("hunter2"));
    }
}
