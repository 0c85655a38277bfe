use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// A backend under test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub description: String,
    pub base_url: Url,
}

impl Target {
    pub fn new(name: &str, base_url: &str, description: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|source| ConfigError::TargetUrl {
            url: base_url.to_string(),
            source,
        })?;

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            base_url,
        })
    }

    /// The three demo backends, in the order they are compared.
    pub fn defaults() -> Vec<Target> {
        [
            (
                "sqlalchemy",
                "http://localhost:8001",
                "SQLAlchemy v2: sync-to-async bridging via greenlet",
            ),
            (
                "tortoise",
                "http://localhost:8002",
                "Tortoise ORM: native async ORM",
            ),
            (
                "edgedb",
                "http://localhost:8003",
                "EdgeDB: graph-relational database with a native query language",
            ),
        ]
        .into_iter()
        .map(|(name, url, description)| Target {
            name: name.to_string(),
            description: description.to_string(),
            base_url: Url::parse(url).expect("default target URLs are valid"),
        })
        .collect()
    }

    /// Absolute URL for `path` (which may carry a query string) under this target.
    ///
    /// Any path prefix on the base URL is preserved.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.base_url)
    }
}

/// Parses `NAME=URL[=DESCRIPTION]`.
impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '=');
        let name = parts.next().map(str::trim).unwrap_or_default();
        let url = parts.next().map(str::trim).unwrap_or_default();
        let description = parts.next().map(str::trim).unwrap_or_default();

        if name.is_empty() || url.is_empty() {
            return Err(ConfigError::TargetSpec(s.to_string()));
        }

        Target::new(name, url, description)
    }
}
