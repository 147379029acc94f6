use std::fmt;

/// Wrapper for configuration values that must never reach the logs: gateway keys, webhook signing secrets.
///
/// Both `Debug` and `Display` print a mask, so a `Secret` can sit inside a config struct that derives `Debug`
/// without leaking. Code that genuinely needs the value calls [`Secret::reveal`] at the point of use.
#[derive(Clone, Default)]
pub struct Secret<T> {
    value: T,
}

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn secrets_never_appear_in_format_output() {
        let key = Secret::new("sk_live_b0gUsKeY".to_string());
        assert_eq!(format!("{key}"), "****");
        assert_eq!(format!("{key:?}"), "****");
        assert_eq!(key.reveal(), "sk_live_b0gUsKeY");
    }
}
