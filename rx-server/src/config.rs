//! Server configuration

/// A session token and the actor it authenticates
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    /// Actor identity written into audit records for this session
    pub actor: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Accepted `X-Session-Token` values
    pub session_tokens: Vec<SessionToken>,
}

impl ServerConfig {
    /// Create a new configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8430,
            cors_enabled: true,
            session_tokens: Vec::new(),
        }
    }
}

/// Builder for ServerConfig
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    port: Option<u16>,
    cors_enabled: Option<bool>,
    session_tokens: Vec<SessionToken>,
}

impl ServerConfigBuilder {
    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Enable or disable CORS
    pub fn cors(mut self, enabled: bool) -> Self {
        self.cors_enabled = Some(enabled);
        self
    }

    /// Register an accepted session token
    pub fn session_token(mut self, token: impl Into<String>, actor: impl Into<String>) -> Self {
        self.session_tokens.push(SessionToken {
            token: token.into(),
            actor: actor.into(),
        });
        self
    }

    /// Build the configuration
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            port: self.port.unwrap_or(8430),
            cors_enabled: self.cors_enabled.unwrap_or(true),
            session_tokens: self.session_tokens,
        }
    }
}
