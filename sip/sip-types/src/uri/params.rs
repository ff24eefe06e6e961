use crate::parse::token;
use bytesstr::BytesStr;
use std::fmt;

/// A single `;name[=value]` parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: BytesStr,
    pub value: Option<BytesStr>,
}

impl Param {
    pub fn name<N: Into<BytesStr>>(name: N) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn value<N, V>(name: N, value: V) -> Self
    where
        N: Into<BytesStr>,
        V: Into<BytesStr>,
    {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, ";{}={}", self.name, value),
            None => write!(f, ";{}", self.name),
        }
    }
}

/// An ordered list of parameters, names are compared case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    params: Vec<Param>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a parameter list like `;transport=ws;lr`
    ///
    /// Leading whitespace and the leading `;` are optional.
    pub fn parse(i: &str) -> anyhow::Result<Self> {
        let mut params = Params::new();

        for part in i.split(';') {
            let part = part.trim();

            if part.is_empty() {
                continue;
            }

            let (name, value) = match part.split_once('=') {
                Some((name, value)) => (name.trim(), Some(value.trim())),
                None => (part, None),
            };

            if name.is_empty() || !name.chars().all(token) {
                anyhow::bail!("invalid parameter name {name:?}");
            }

            params.push(Param {
                name: BytesStr::from(name.to_owned()),
                value: value.map(|v| BytesStr::from(v.to_owned())),
            });
        }

        Ok(params)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn with(mut self, param: Param) -> Self {
        self.push(param);
        self
    }

    #[inline]
    pub fn push(&mut self, param: Param) {
        self.params.push(param);
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn get_val(&self, name: &str) -> Option<&BytesStr> {
        self.get(name).and_then(|p| p.value.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a parameter, returning its value
    pub fn take(&mut self, name: &str) -> Option<BytesStr> {
        let idx = self
            .params
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))?;

        self.params.remove(idx).value
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for param in &self.params {
            param.fmt(f)?;
        }

        Ok(())
    }
}
