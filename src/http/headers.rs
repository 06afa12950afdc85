use std::fmt;

/// Ordered header list with case-insensitive lookup.
///
/// Names keep the casing they were received or inserted with, so writing a
/// response reproduces exactly what the handler set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a header value, ignoring ASCII case in the name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Adds a header, replacing any existing value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.entries {
            write!(f, "{}: {}\r\n", k, v)?;
        }
        Ok(())
    }
}

/// Lower-cases a header value up to its first `;`, keeping parameters as-is.
///
/// `Text/HTML; charset=UTF-8` becomes `text/html; charset=UTF-8`.
pub fn normalize_header_value(value: &str) -> String {
    match value.split_once(';') {
        Some((head, params)) => format!("{};{}", head.trim().to_ascii_lowercase(), params),
        None => value.trim().to_ascii_lowercase(),
    }
}

/// Removes CR and LF so a value cannot end its header line early.
pub fn strip_line_breaks(value: impl Into<String>) -> String {
    let mut value = value.into();
    value.retain(|c| c != '\r' && c != '\n');
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let headers: Headers = [("Content-Type", "text/plain")].into_iter().collect();
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn insert_replaces_regardless_of_case() {
        let mut headers = Headers::new();
        headers.insert("X-Token", "a");
        headers.insert("x-token", "b");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("X-Token"), Some("b"));
    }

    #[test]
    fn line_breaks_are_stripped() {
        assert_eq!(strip_line_breaks("a\r\nX-Evil: 1"), "aX-Evil: 1");
        assert_eq!(strip_line_breaks("plain"), "plain");
    }

    #[test]
    fn normalize_keeps_parameters() {
        assert_eq!(
            normalize_header_value("Text/HTML; charset=UTF-8"),
            "text/html; charset=UTF-8"
        );
        assert_eq!(normalize_header_value(" Application/JSON "), "application/json");
    }
}
