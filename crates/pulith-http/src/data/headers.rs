use std::fmt;

use crate::core::{validate_name, validate_value};
use crate::error::{FetchError, Result};

/// Ordered multi-map of validated HTTP header fields.
///
/// Names are stored lowercased and compared case-insensitively. Each name
/// keeps its values in insertion order, and names keep the order in which
/// they were first inserted.
///
/// # Examples
///
/// ```
/// use pulith_http::Headers;
///
/// let mut headers = Headers::new();
/// headers.append("Accept", "text/html").unwrap();
/// headers.append("accept", "application/json").unwrap();
///
/// assert_eq!(headers.get("ACCEPT").unwrap().as_deref(), Some("text/html, application/json"));
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

/// Shape of a header as handed to a transport backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawHeaderValue {
    Single(String),
    Multi(Vec<String>),
}

impl RawHeaderValue {
    /// Iterate the contained values in order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let slice = match self {
            RawHeaderValue::Single(v) => std::slice::from_ref(v),
            RawHeaderValue::Multi(vs) => vs.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from name/value pairs, appending in iteration order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.append(name.as_ref(), value.as_ref())?;
        }
        Ok(headers)
    }

    /// Build from a list of entries that must each hold exactly two items.
    ///
    /// An entry of any other length fails with an out-of-range error.
    pub fn from_entries<I, E, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = E>,
        E: AsRef<[S]>,
        S: AsRef<str>,
    {
        let mut headers = Self::new();
        for entry in entries {
            match entry.as_ref() {
                [name, value] => headers.append(name.as_ref(), value.as_ref())?,
                other => {
                    return Err(FetchError::out_of_range(
                        "init",
                        "a list of [name, value] pairs",
                        format!("an entry of length {}", other.len()),
                    ));
                }
            }
        }
        Ok(headers)
    }

    pub fn append(&mut self, name: &str, value: &str) -> Result<()> {
        let value = validate_value(value)?;
        let name = validate_name(name)?;
        match self.position(&name) {
            Some(idx) => self.entries[idx].1.push(value),
            None => self.entries.push((name, vec![value])),
        }
        Ok(())
    }

    /// Replace every value of `name` with a single value.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let value = validate_value(value)?;
        let name = validate_name(name)?;
        match self.position(&name) {
            Some(idx) => self.entries[idx].1 = vec![value],
            None => self.entries.push((name, vec![value])),
        }
        Ok(())
    }

    /// Values of `name` joined with `", "`, or `None` when absent.
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        let name = validate_name(name)?;
        Ok(self
            .position(&name)
            .map(|idx| self.entries[idx].1.join(", ")))
    }

    /// Every value of `name`, in append order.
    pub fn get_all(&self, name: &str) -> Result<&[String]> {
        let name = validate_name(name)?;
        Ok(self
            .position(&name)
            .map(|idx| self.entries[idx].1.as_slice())
            .unwrap_or(&[]))
    }

    pub fn has(&self, name: &str) -> Result<bool> {
        let name = validate_name(name)?;
        Ok(self.position(&name).is_some())
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        self.entries.retain(|(n, _)| *n != name);
        Ok(())
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, joined value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, String)> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.join(", ")))
    }

    /// Snapshot in the shape transport backends expect.
    ///
    /// `host` always collapses to its first value; other names become a
    /// scalar when they hold one value and a sequence otherwise.
    pub fn raw(&self) -> Vec<(String, RawHeaderValue)> {
        self.entries
            .iter()
            .map(|(name, values)| {
                let raw = if name == "host" || values.len() == 1 {
                    RawHeaderValue::Single(values[0].clone())
                } else {
                    RawHeaderValue::Multi(values.clone())
                };
                (name.clone(), raw)
            })
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }
}

impl<K, V, const N: usize> TryFrom<[(K, V); N]> for Headers
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    type Error = FetchError;

    fn try_from(pairs: [(K, V); N]) -> Result<Self> {
        Self::from_pairs(pairs)
    }
}

impl<K, V> TryFrom<Vec<(K, V)>> for Headers
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    type Error = FetchError;

    fn try_from(pairs: Vec<(K, V)>) -> Result<Self> {
        Self::from_pairs(pairs)
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "Headers {{}}");
        }
        write!(f, "Headers {{ ")?;
        for (i, (name, values)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match values.as_slice() {
                [single] => write!(f, "'{name}' => '{single}'")?,
                many => {
                    let quoted: Vec<String> = many.iter().map(|v| format!("'{v}'")).collect();
                    write!(f, "'{name}' => [ {} ]", quoted.join(", "))?;
                }
            }
        }
        write!(f, " }}")
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(n, v)| (n, v)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_get_joins_in_order() {
        let mut headers = Headers::new();
        headers.append("Set-Cookie", "a=1").unwrap();
        headers.append("set-cookie", "b=2").unwrap();
        headers.append("SET-COOKIE", "c=3").unwrap();
        assert_eq!(headers.get("Set-Cookie").unwrap().as_deref(), Some("a=1, b=2, c=3"));
        assert_eq!(headers.get_all("set-cookie").unwrap().len(), 3);
    }

    #[test]
    fn set_replaces_all_values() {
        let mut headers = Headers::try_from([("accept", "a"), ("Accept", "b")]).unwrap();
        headers.set("ACCEPT", "c").unwrap();
        assert_eq!(headers.get("accept").unwrap().as_deref(), Some("c"));
    }

    #[test]
    fn get_missing_is_none() {
        let headers = Headers::new();
        assert_eq!(headers.get("x-missing").unwrap(), None);
        assert!(!headers.has("x-missing").unwrap());
    }

    #[test]
    fn delete_removes_name() {
        let mut headers = Headers::try_from([("a", "1"), ("b", "2")]).unwrap();
        headers.delete("A").unwrap();
        assert!(!headers.has("a").unwrap());
        assert!(headers.has("b").unwrap());
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn invalid_input_leaves_store_unchanged() {
        let mut headers = Headers::try_from([("a", "1")]).unwrap();
        let before = headers.clone();

        assert!(matches!(headers.append("bad name", "x"), Err(FetchError::OutOfRange { .. })));
        assert!(matches!(headers.append("a", "x\ny"), Err(FetchError::OutOfRange { .. })));
        assert!(matches!(headers.set("a", "x\0y"), Err(FetchError::OutOfRange { .. })));
        assert!(matches!(headers.set("bad:name", "x"), Err(FetchError::OutOfRange { .. })));
        assert!(headers.delete("bad name").is_err());
        assert!(headers.get("bad name").is_err());
        assert!(headers.has("").is_err());

        assert_eq!(headers, before);
    }

    #[test]
    fn values_are_trimmed() {
        let mut headers = Headers::new();
        headers.append("x-padded", " \t value \r\n").unwrap();
        assert_eq!(headers.get("x-padded").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn from_entries_requires_pairs() {
        let headers = Headers::from_entries([vec!["a", "1"], vec!["b", "2"]]).unwrap();
        assert_eq!(headers.len(), 2);

        let err = Headers::from_entries([vec!["a", "1"], vec!["b"]]).unwrap_err();
        assert!(matches!(err, FetchError::OutOfRange { .. }));

        let err = Headers::from_entries([vec!["a", "1", "extra"]]).unwrap_err();
        assert!(matches!(err, FetchError::OutOfRange { .. }));
    }

    #[test]
    fn clone_is_deep() {
        let original = Headers::try_from([("a", "1")]).unwrap();
        let mut copy = original.clone();
        copy.append("a", "2").unwrap();
        assert_eq!(original.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(copy.get("a").unwrap().as_deref(), Some("1, 2"));
    }

    #[test]
    fn raw_forces_scalar_host() {
        let headers = Headers::try_from([
            ("Host", "example.com"),
            ("host", "other.com"),
            ("Accept", "a"),
            ("Cookie", "x=1"),
            ("cookie", "y=2"),
        ])
        .unwrap();

        let raw = headers.raw();
        assert_eq!(raw[0], ("host".to_string(), RawHeaderValue::Single("example.com".into())));
        assert_eq!(raw[1], ("accept".to_string(), RawHeaderValue::Single("a".into())));
        assert_eq!(
            raw[2],
            (
                "cookie".to_string(),
                RawHeaderValue::Multi(vec!["x=1".into(), "y=2".into()])
            )
        );
        assert_eq!(raw[2].1.values().collect::<Vec<_>>(), vec!["x=1", "y=2"]);
    }

    #[test]
    fn display_matches_inspect_form() {
        assert_eq!(Headers::new().to_string(), "Headers {}");

        let headers = Headers::try_from([("a", "1"), ("b", "2"), ("b", "3")]).unwrap();
        assert_eq!(headers.to_string(), "Headers { 'a' => '1', 'b' => [ '2', '3' ] }");
    }

    #[test]
    fn iter_preserves_insertion_order() {
        let headers = Headers::try_from([("z", "1"), ("a", "2"), ("Z", "3")]).unwrap();
        let pairs: Vec<(&str, String)> = headers.iter().collect();
        assert_eq!(pairs, vec![("z", "1, 3".to_string()), ("a", "2".to_string())]);
    }
}
