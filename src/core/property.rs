//! Run-time properties and the typed templates that reference them
//!
//! A [`Template`] is a sequence of literal text and property references. It is
//! resolved against a [`PropertyStore`] right before the owning step runs, so a
//! step may use a value that an earlier step of the same run produced.

use crate::core::error::BuildError;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Name of a run-time property
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PropertyKey(Cow<'static, str>);

impl PropertyKey {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full release version, e.g. `0.8.1-0`
pub const RELEASE_VERSION: PropertyKey = PropertyKey::from_static("release_version");
/// Release version without the Debian revision, e.g. `0.8.1`
pub const PARTIAL_VERSION: PropertyKey = PropertyKey::from_static("partial_version");
/// Timestamp stamped into the changelog of each package
pub const DATESTAMP: PropertyKey = PropertyKey::from_static("datestamp");
/// Working area of the worker hosting the run
pub const WORKDIR: PropertyKey = PropertyKey::from_static("workdir");
/// Name of the worker hosting the run
pub const WORKERNAME: PropertyKey = PropertyKey::from_static("workername");

/// One piece of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Property(PropertyKey),
}

/// A string whose value is only known once referenced properties are set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    tokens: Vec<Token>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Template made of a single literal
    pub fn literal(text: impl Into<String>) -> Self {
        Self::new().lit(text)
    }

    /// Template made of a single property reference
    pub fn property(key: &PropertyKey) -> Self {
        Self::new().prop(key)
    }

    /// Append literal text
    pub fn lit(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return self;
        }
        // Adjacent literals are merged so rendering stays a plain join
        if let Some(Token::Literal(last)) = self.tokens.last_mut() {
            last.push_str(&text);
        } else {
            self.tokens.push(Token::Literal(text));
        }
        self
    }

    /// Append a property reference
    pub fn prop(mut self, key: &PropertyKey) -> Self {
        self.tokens.push(Token::Property(key.clone()));
        self
    }

    /// Append every token of another template
    pub fn append(self, other: &Template) -> Self {
        other.tokens.iter().fold(self, |acc, token| match token {
            Token::Literal(text) => acc.lit(text.as_str()),
            Token::Property(key) => acc.prop(key),
        })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Property keys referenced by this template, in order of appearance
    pub fn references(&self) -> impl Iterator<Item = &PropertyKey> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Property(key) => Some(key),
            Token::Literal(_) => None,
        })
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Template::literal(text)
    }
}

impl From<String> for Template {
    fn from(text: String) -> Self {
        Template::literal(text)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            match token {
                Token::Literal(text) => f.write_str(text)?,
                Token::Property(key) => write!(f, "%(prop:{})s", key)?,
            }
        }
        Ok(())
    }
}

/// Per-run bag of property values
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    values: HashMap<String, String>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with initial properties
    pub fn seeded<'a, I>(initial: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut store = Self::new();
        for (key, value) in initial {
            store.values.insert(key.clone(), value.clone());
        }
        store
    }

    pub fn get(&self, key: &PropertyKey) -> Result<&str, BuildError> {
        self.values
            .get(key.as_str())
            .map(String::as_str)
            .ok_or_else(|| BuildError::undefined(key.as_str()))
    }

    /// Set a property; later reads see the most recent value
    pub fn set(&mut self, key: &PropertyKey, value: impl Into<String>) {
        self.values.insert(key.as_str().to_string(), value.into());
    }

    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.values.contains_key(key.as_str())
    }

    /// Substitute every property reference with its current value
    pub fn interpolate(&self, template: &Template) -> Result<String, BuildError> {
        let mut rendered = String::new();
        for token in template.tokens() {
            match token {
                Token::Literal(text) => rendered.push_str(text),
                Token::Property(key) => rendered.push_str(self.get(key)?),
            }
        }
        Ok(rendered)
    }

    /// Ordered copy of every property
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
