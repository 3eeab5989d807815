use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque bearer token issued by the auth API.
///
/// The backing memory is zeroed on drop and the token never shows up in
/// `Debug` or `Display` output, so it is safe to log session state.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken {
    data: String,
}

impl AccessToken {
    pub fn new(data: String) -> Self {
        Self { data }
    }

    /// Borrow the raw token, e.g. to build an `Authorization` header.
    pub fn expose_secret(&self) -> &str {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<String> for AccessToken {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

impl From<&str> for AccessToken {
    fn from(data: &str) -> Self {
        Self::new(data.to_string())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("len", &self.len())
            .field("data", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[AccessToken: {} bytes]", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_never_leaks_the_token() {
        let token = AccessToken::from("eyJhbGciOiJIUzI1NiJ9.secret");
        let debug = format!("{:?}", token);
        let display = format!("{}", token);

        assert!(!debug.contains("secret"));
        assert!(!display.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn zeroize_clears_data() {
        let mut token = AccessToken::from("abc123");
        token.zeroize();
        assert!(token.is_empty());
    }
}
