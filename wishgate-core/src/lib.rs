use std::fmt;

use serde::Deserialize;


/// The shared secret that opens a session.
///
/// Comparison is exact: case-sensitive, no trimming, no hashing. The value
/// never shows up in `Debug` or `Display` output so it can't leak into logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Password(String);


impl Password {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn matches(&self, provided: &str) -> bool {
        self.0 == provided
    }
}


impl Default for Password {
    fn default() -> Self {
        Self::new("test")
    }
}


impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}


impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}
