//! HTTP header multimap.
use bytes::Bytes;
use std::fmt;

/// HTTP Headers Multimap.
///
/// Lookup is case-insensitive while the name casing from the first insertion
/// is preserved. [`insert`][HeaderMap::insert] replaces the value of an
/// existing name, so for request parsing the last value wins; the response
/// side may hold duplicates via [`append`][HeaderMap::append].
#[derive(Clone, Default)]
pub struct HeaderMap {
    fields: Vec<(Bytes, Bytes)>,
}

impl HeaderMap {
    /// Create new empty [`HeaderMap`].
    ///
    /// This function does not allocate.
    #[inline]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Create new empty [`HeaderMap`] with at least the specified capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { fields: Vec::with_capacity(capacity) }
    }

    /// Returns headers length.
    #[inline]
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if headers has no element.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ===== Lookup =====

impl HeaderMap {
    /// Returns `true` if the map contains a value for given header name.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name.as_bytes()).is_some()
    }

    /// Returns the first value for given header name.
    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.position(name.as_bytes()).map(|at| &self.fields[at].1)
    }

    /// Returns the first value for given header name as a string slice, if
    /// it is valid UTF-8.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| str::from_utf8(value).ok())
    }

    /// Returns every value stored under given header name.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Bytes> {
        self.fields
            .iter()
            .filter(move |(field, _)| field.eq_ignore_ascii_case(name.as_bytes()))
            .map(|(_, value)| value)
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Bytes)> {
        self.fields.iter().map(|(name, value)| (name, value))
    }

    fn position(&self, name: &[u8]) -> Option<usize> {
        self.fields
            .iter()
            .position(|(field, _)| field.eq_ignore_ascii_case(name))
    }
}

// ===== Mutation =====

impl HeaderMap {
    /// Insert a header, replacing the value of an existing name.
    ///
    /// The name casing already stored is kept; only the value changes.
    /// Returns the replaced value, if any.
    pub fn insert(
        &mut self,
        name: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Option<Bytes> {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(at) => Some(std::mem::replace(&mut self.fields[at].1, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    /// Append a header without touching existing entries of the same name.
    pub fn append(&mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Remove every entry stored under given header name.
    pub fn remove(&mut self, name: &str) {
        self.fields
            .retain(|(field, _)| !field.eq_ignore_ascii_case(name.as_bytes()));
    }

    /// Remove all headers.
    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.iter() {
            map.entry(
                &String::from_utf8_lossy(name),
                &String::from_utf8_lossy(value),
            );
        }
        map.finish()
    }
}

#[cfg(test)]
mod test {
    use super::HeaderMap;

    #[test]
    fn insert_is_case_insensitive_and_last_value_wins() {
        let mut map = HeaderMap::new();

        map.insert("Content-Type", "text/html");
        map.insert("content-type", "application/json");

        assert_eq!(map.len(), 1);
        assert_eq!(map.get_str("CONTENT-TYPE"), Some("application/json"));

        // original casing from the first insertion survives
        let (name, _) = map.iter().next().unwrap();
        assert_eq!(&name[..], b"Content-Type");
    }

    #[test]
    fn append_keeps_duplicates() {
        let mut map = HeaderMap::new();

        map.append("set-cookie", "a=1");
        map.append("Set-Cookie", "b=2");

        assert_eq!(map.get_all("set-cookie").count(), 2);
        assert_eq!(map.len(), 2);

        map.remove("SET-COOKIE");
        assert!(map.is_empty());
    }
}
