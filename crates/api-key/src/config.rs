//! Options for random string generation.

/// Options controlling how [`random_string`](crate::random_string) builds its output.
#[derive(Debug, Clone, Default)]
pub struct RandomOptions {
    /// Restrict the charset to alphanumerics. When false, the RFC 3986
    /// unreserved symbols `-`, `.` and `~` are mixed in as well.
    pub safe: bool,
    /// Draw letters from `A-Z` only.
    pub upper_case: bool,
    /// Prepended verbatim to the random part; not counted in the length.
    pub prefix: Option<String>,
}

impl RandomOptions {
    /// Create options with the full (unsafe) charset, mixed case and no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the charset to alphanumerics.
    pub fn safe(mut self, safe: bool) -> Self {
        self.safe = safe;
        self
    }

    /// Force upper case letters.
    pub fn upper_case(mut self, upper_case: bool) -> Self {
        self.upper_case = upper_case;
        self
    }

    /// Set the prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}
