//! Static credential set backing the auth gate.

use std::collections::HashSet;
use std::sync::Arc;

/// Fixed set of accepted credentials. Never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    tokens: Arc<HashSet<String>>,
}

impl TokenSet {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = tokens
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.is_empty())
            .collect();
        Self {
            tokens: Arc::new(tokens),
        }
    }

    /// Membership check. Empty credentials are never accepted.
    pub fn authorize(&self, credential: &str) -> bool {
        !credential.is_empty() && self.tokens.contains(credential)
    }
}
