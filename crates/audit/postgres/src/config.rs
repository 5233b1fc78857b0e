/// Configuration for the Postgres audit store.
pub struct PostgresAuditConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Table name prefix (e.g. `"leadfit_"`).
    pub prefix: String,
    /// Maximum size of the pooled connection set (§5: default 20).
    pub max_connections: u32,
}

impl PostgresAuditConfig {
    /// Create a new configuration with the given URL and defaults.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prefix: "leadfit_".to_owned(),
            max_connections: 20,
        }
    }

    /// Set the table prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the pool's maximum connection count.
    #[must_use]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }
}
