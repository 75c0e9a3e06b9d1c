/// Connection settings for the real-time database backend.
#[derive(Debug, Clone)]
pub struct RtdbConfig {
    /// Database root, e.g. `https://myapp.firebaseio.example`.
    pub base_url: String,
    /// Optional auth token appended to every request.
    pub auth_token: Option<String>,
}

impl RtdbConfig {
    /// Configuration for an unauthenticated database.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
        }
    }

    /// Attach an auth token to every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}
