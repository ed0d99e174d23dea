//! Store configuration and connection string parsing.
//!
//! A connection string is a `;`-separated list of `Key=Value` pairs. Keys are matched
//! case-insensitively:
//!
//! | key                           | meaning |
//! |-------------------------------|---------|
//! | `Url`                         | server url (required) |
//! | `Database` / `DefaultDatabase`| default database name |
//! | `ApiKey`                      | api key used for authentication |
//! | `User`, `Password`            | basic credentials |
//! | `FailoverBehavior`            | see [`FailoverBehavior`] |
//!
//! ```ignore
//! let options: StoreOptions = "Url=http://localhost:8080;Database=Blog".parse()?;
//! assert_eq!(options.database(), Some("Blog"));
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// How the client reacts when the primary server is unreachable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailoverBehavior {
    /// Fail the request immediately.
    #[default]
    FailImmediately,
    /// Allow reads from secondary servers.
    AllowReadsFromSecondaries,
    /// Allow reads from and writes to secondary servers.
    AllowReadsFromSecondariesAndWritesToSecondaries,
}

impl FromStr for FailoverBehavior {
    type Err = DocumentStoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "failimmediately" => Ok(Self::FailImmediately),
            "allowreadsfromsecondaries" => Ok(Self::AllowReadsFromSecondaries),
            "allowreadsfromsecondariesandwritestosecondaries" => {
                Ok(Self::AllowReadsFromSecondariesAndWritesToSecondaries)
            }
            other => Err(DocumentStoreError::Configuration(format!(
                "unknown failover behavior `{other}`"
            ))),
        }
    }
}

/// Basic credentials for the store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection options for a document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    url: String,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    credentials: Option<Credentials>,
    #[serde(default)]
    failover_behavior: FailoverBehavior,
}

impl StoreOptions {
    /// Creates a builder for the given server url.
    pub fn builder(url: impl Into<String>) -> StoreOptionsBuilder {
        StoreOptionsBuilder::new(url)
    }

    /// Parses a connection string.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if a pair is malformed, a key is unknown,
    /// `Url` is missing, or only one of `User`/`Password` is given.
    pub fn parse(connection_string: &str) -> DocumentStoreResult<Self> {
        let mut url = None;
        let mut database = None;
        let mut api_key = None;
        let mut user = None;
        let mut password = None;
        let mut failover_behavior = FailoverBehavior::default();

        for pair in connection_string.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                DocumentStoreError::Configuration(format!("expected `key=value`, found `{pair}`"))
            })?;
            let value = value.trim().to_string();

            match key.trim().to_ascii_lowercase().as_str() {
                "url" => url = Some(value),
                "database" | "defaultdatabase" => database = Some(value),
                "apikey" => api_key = Some(value),
                "user" => user = Some(value),
                "password" => password = Some(value),
                "failoverbehavior" => failover_behavior = value.parse()?,
                other => {
                    return Err(DocumentStoreError::Configuration(format!(
                        "unknown connection string option `{other}`"
                    )));
                }
            }
        }

        let url = url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| DocumentStoreError::Configuration("connection string has no `Url`".to_string()))?;

        let credentials = match (user, password) {
            (Some(user), Some(password)) => Some(Credentials { user, password }),
            (None, None) => None,
            _ => {
                return Err(DocumentStoreError::Configuration(
                    "`User` and `Password` must be given together".to_string(),
                ));
            }
        };

        Ok(Self {
            url,
            database,
            api_key,
            credentials,
            failover_behavior,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn failover_behavior(&self) -> FailoverBehavior {
        self.failover_behavior
    }
}

impl FromStr for StoreOptions {
    type Err = DocumentStoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Builder for [`StoreOptions`].
#[derive(Debug, Clone)]
pub struct StoreOptionsBuilder {
    options: StoreOptions,
}

impl StoreOptionsBuilder {
    /// Creates a builder for the given server url.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            options: StoreOptions {
                url: url.into(),
                database: None,
                api_key: None,
                credentials: None,
                failover_behavior: FailoverBehavior::default(),
            },
        }
    }

    /// Sets the default database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.options.database = Some(database.into());
        self
    }

    /// Sets the api key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.options.api_key = Some(api_key.into());
        self
    }

    /// Sets basic credentials.
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.options.credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Sets the failover behavior.
    pub fn failover_behavior(mut self, behavior: FailoverBehavior) -> Self {
        self.options.failover_behavior = behavior;
        self
    }

    /// Builds the options.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if the url is empty.
    pub fn build(self) -> DocumentStoreResult<StoreOptions> {
        if self.options.url.trim().is_empty() {
            return Err(DocumentStoreError::Configuration("store url must not be empty".to_string()));
        }

        Ok(self.options)
    }
}
