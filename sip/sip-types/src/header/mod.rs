use crate::parse::split_list;
use bytesstr::BytesStr;
use std::{error, fmt};

pub mod name;
pub mod typed;

use name::Name;

/// Header type with a fixed name
pub trait ConstNamed {
    const NAME: Name;
}

/// Header type that can be parsed from a single header value
pub trait HeaderParse: Sized {
    fn parse(value: &str) -> anyhow::Result<Self>;
}

/// Error that occurred when trying to decode a header from [`Headers`].
#[derive(Debug)]
pub struct HeaderError {
    name: Name,
    repr: Repr,
}

#[derive(Debug)]
enum Repr {
    Missing,
    Malformed(anyhow::Error),
}

impl HeaderError {
    pub const fn missing(name: Name) -> Self {
        HeaderError {
            name,
            repr: Repr::Missing,
        }
    }

    pub const fn malformed(name: Name, error: anyhow::Error) -> Self {
        HeaderError {
            name,
            repr: Repr::Malformed(error),
        }
    }

    pub const fn is_missing(&self) -> bool {
        matches!(&self.repr, Repr::Missing)
    }
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Missing => write!(f, "header {} is missing", self.name),
            Repr::Malformed(err) => {
                write!(f, "header {} was found but is malformed: {}", self.name, err)
            }
        }
    }
}

impl error::Error for HeaderError {}

/// Ordered list of SIP headers
///
/// Each entry is a single header line, multiple lines with the same name are kept in order.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(Name, BytesStr)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Append a raw header line
    pub fn insert<V>(&mut self, name: Name, value: V)
    where
        V: Into<BytesStr>,
    {
        self.entries.push((name, value.into()));
    }

    /// Insert a raw header line before all other lines
    pub fn insert_front<V>(&mut self, name: Name, value: V)
    where
        V: Into<BytesStr>,
    {
        self.entries.insert(0, (name, value.into()));
    }

    /// Append a typed header with its constant name
    pub fn insert_named<H: ConstNamed + fmt::Display>(&mut self, header: &H) {
        self.insert(H::NAME, header.to_string());
    }

    /// Append a typed header under the given name
    pub fn insert_type<H: fmt::Display>(&mut self, name: Name, header: &H) {
        self.insert(name, header.to_string());
    }

    /// Remove all lines with the given name, returning their values
    pub fn remove(&mut self, name: &Name) -> Vec<BytesStr> {
        let mut removed = vec![];

        self.entries.retain(|(n, value)| {
            if n == name {
                removed.push(value.clone());
                false
            } else {
                true
            }
        });

        removed
    }

    /// Replace all lines of a typed header with a single one
    pub fn replace_named<H: ConstNamed + fmt::Display>(&mut self, header: &H) {
        self.remove(&H::NAME);
        self.insert_named(header);
    }

    /// Returns the raw value of the first line with the given name
    pub fn get_raw(&self, name: &Name) -> Option<&BytesStr> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Returns the raw values of all lines with the given name
    pub fn get_all_raw<'s>(&'s self, name: &'s Name) -> impl Iterator<Item = &'s BytesStr> + 's {
        self.entries
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Parse the first line with the given name
    pub fn get<H: HeaderParse>(&self, name: Name) -> Result<H, HeaderError> {
        let Some(value) = self.get_raw(&name) else {
            return Err(HeaderError::missing(name));
        };

        H::parse(value).map_err(|e| HeaderError::malformed(name, e))
    }

    pub fn get_named<H: ConstNamed + HeaderParse>(&self) -> Result<H, HeaderError> {
        self.get(H::NAME)
    }

    /// Parse every line with the given name, one value per line
    pub fn get_all<H: HeaderParse>(&self, name: Name) -> Result<Vec<H>, HeaderError> {
        self.get_all_raw(&name)
            .map(|value| H::parse(value).map_err(|e| HeaderError::malformed(name.clone(), e)))
            .collect()
    }

    /// Parse every comma separated value of all lines with the given name
    pub fn get_list<H: HeaderParse>(&self, name: Name) -> Result<Vec<H>, HeaderError> {
        let mut values = vec![];

        for line in self.get_all_raw(&name) {
            for value in split_list(line) {
                values.push(H::parse(value).map_err(|e| HeaderError::malformed(name.clone(), e))?);
            }
        }

        Ok(values)
    }

    /// Copy all lines with the given name into `dst`
    pub fn clone_into(&self, dst: &mut Self, name: Name) {
        for value in self.get_all_raw(&name) {
            dst.insert(name.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &BytesStr)> + '_ {
        self.entries.iter().map(|(name, value)| (name, value))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{}: {}\r\n", name, value)?;
        }

        Ok(())
    }
}
