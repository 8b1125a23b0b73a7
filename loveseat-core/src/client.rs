//! Composition root: one call wiring a server and its named databases.
//!
//! [`initialize`] replaces process-wide registries with an explicit [`Databases`]
//! value. Mapper types can be bound to a database by name so that
//! [`Mapper::fetch`](crate::mapper::Mapper::fetch) and
//! [`Mapper::put`](crate::mapper::Mapper::put) find it without being told.
//!
//! # Example
//!
//! ```ignore
//! let (server, databases) = initialize(
//!     transport,
//!     ServerConfig::default(),
//!     DatabaseSpec::new()
//!         .bind::<Person>("people")
//!         .database("audit")
//!         .create_missing(true),
//! )
//! .await?;
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};
use tracing::debug;

use crate::{
    config::ServerConfig,
    database::Database,
    error::{LoveseatError, LoveseatResult},
    mapper::Mapper,
    server::Server,
    transport::Transport,
};

/// Which databases to open at initialization and which mapper types they serve.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatabaseSpec {
    names: Vec<String>,
    bindings: Vec<(&'static str, String)>,
    create_missing: bool,
}

impl DatabaseSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens every database in `names`.
    pub fn names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        names
            .into_iter()
            .fold(Self::new(), |spec, name| spec.database(name))
    }

    /// Opens the database `name`.
    pub fn database(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
        self
    }

    /// Opens the database `name` and makes it the default database of `M`.
    pub fn bind<M: Mapper>(self, name: impl Into<String>) -> Self {
        let name = name.into();
        let mut spec = self.database(name.clone());
        spec.bindings.retain(|(type_name, _)| *type_name != M::type_name());
        spec.bindings.push((M::type_name(), name));
        spec
    }

    /// Creates databases that do not exist yet instead of only addressing them.
    pub fn create_missing(mut self, create: bool) -> Self {
        self.create_missing = create;
        self
    }
}

impl<S: Into<String>> FromIterator<S> for DatabaseSpec {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::names(iter)
    }
}

/// The databases opened at initialization, looked up by name or by mapper type.
#[derive(Clone, Debug, Default)]
pub struct Databases {
    databases: BTreeMap<String, Database>,
    bindings: HashMap<&'static str, String>,
}

impl Databases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a database handle, replacing one with the same name.
    pub fn insert(&mut self, database: Database) {
        self.databases.insert(database.name().to_string(), database);
    }

    /// Makes `name` the default database of `M`.
    pub fn bind<M: Mapper>(&mut self, name: impl Into<String>) {
        self.bindings.insert(M::type_name(), name.into());
    }

    pub fn get(&self, name: &str) -> Option<&Database> {
        self.databases.get(name)
    }

    /// Returns the only configured database, or `None` if there are zero or several.
    pub fn only(&self) -> Option<&Database> {
        match self.databases.len() {
            1 => self.databases.values().next(),
            _ => None,
        }
    }

    /// Picks the database for mapper type `M`: its binding, else the only database.
    ///
    /// # Errors
    ///
    /// Returns [`LoveseatError::DatabaseNotResolved`] if neither applies.
    pub fn resolve<M: Mapper>(&self) -> LoveseatResult<&Database> {
        self.bindings
            .get(M::type_name())
            .and_then(|name| self.databases.get(name))
            .or_else(|| self.only())
            .ok_or_else(|| LoveseatError::DatabaseNotResolved(M::type_name().to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }
}

impl fmt::Display for Databases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let databases: Vec<String> = self.databases.values().map(ToString::to_string).collect();

        write!(f, "[{}]", databases.join(", "))
    }
}

/// Connects to a server and opens the databases named in `spec`.
///
/// Databases are only addressed unless `spec` asks to create missing ones, in which
/// case each is checked with `HEAD` and created with `PUT` when absent.
///
/// # Errors
///
/// Returns [`LoveseatError::Configuration`] for invalid settings or a binding naming
/// an unknown database, and propagates any failure while creating databases.
pub async fn initialize(
    transport: impl Transport + 'static,
    config: ServerConfig,
    spec: DatabaseSpec,
) -> LoveseatResult<(Server, Databases)> {
    let server = Server::new(transport, &config)?;
    let mut databases = Databases::new();

    for name in &spec.names {
        let database = if spec.create_missing && !server.exists(name).await? {
            server.create_database(name).await?
        } else {
            server.database(name)
        };

        debug!(database = %name, "opened database");
        databases.insert(database);
    }

    for (type_name, name) in spec.bindings {
        if databases.get(&name).is_none() {
            return Err(LoveseatError::Configuration(format!(
                "{type_name} is bound to unknown database {name}"
            )));
        }
        databases.bindings.insert(type_name, name);
    }

    Ok((server, databases))
}
