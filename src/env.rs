//! Named value lookup over the process environment.
//!
//! Values are returned as-is. Nothing is validated here: an unset variable
//! without a default surfaces as `None` (or an empty string) and fails at the
//! point where it is used.

type Lookup = Box<dyn Fn(&str) -> Option<String>>;

pub struct Env {
    lookup: Lookup,
}

impl Env {
    /// Read from the real process environment.
    pub fn process() -> Self {
        Self {
            lookup: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Read from a fixed set of pairs instead of the process environment.
    #[cfg(test)]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        use std::collections::BTreeMap;

        let values: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            lookup: Box::new(move |name| values.get(name).cloned()),
        }
    }

    pub fn read(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
    }

    pub fn read_or(&self, name: &str, default: &str) -> String {
        self.read(name).unwrap_or_else(|| default.to_string())
    }
}
