//! Transport endpoint resolver.

/// Default primary backend address.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/ws";

/// Default alternate backend address.
pub const DEFAULT_WS_URL_ALT: &str = "ws://localhost:8000/ws";

/// Two candidate backend addresses and which one to try next.
///
/// Some environments resolve only one of `127.0.0.1` / `localhost`, so every
/// disconnect flips the preference and consecutive attempts alternate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    primary: String,
    alternate: String,
    prefer_alternate: bool,
}

impl Endpoint {
    /// Creates an endpoint pair. The first attempt uses the alternate address.
    pub fn new(primary: impl Into<String>, alternate: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            alternate: alternate.into(),
            prefer_alternate: true,
        }
    }

    /// Overrides which address is attempted first.
    pub fn with_preference(mut self, prefer_alternate: bool) -> Self {
        self.prefer_alternate = prefer_alternate;
        self
    }

    /// Address for the next connection attempt.
    pub fn current(&self) -> &str {
        if self.prefer_alternate {
            &self.alternate
        } else {
            &self.primary
        }
    }

    pub fn prefers_alternate(&self) -> bool {
        self.prefer_alternate
    }

    /// Switches to the other address.
    pub fn flip(&mut self) {
        self.prefer_alternate = !self.prefer_alternate;
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_WS_URL, DEFAULT_WS_URL_ALT)
    }
}
