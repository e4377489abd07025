//! Collection and global slugs.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CollectionName`] or [`GlobalSlug`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum SlugError {
    /// The input string is empty.
    #[error("slug cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[a-z0-9_-]`.
    #[error("slug contains invalid character '{found}'")]
    InvalidChar {
        /// The offending character.
        found: char,
    },
    /// The input does not start with a lowercase letter or digit.
    #[error("slug must start with a lowercase letter or digit")]
    InvalidStart,
}

/// Maximum slug length shared by collections and globals.
///
/// Slugs become part of SQL predicates and log lines; 64 characters is far
/// beyond anything a real schema uses.
const MAX_SLUG_LENGTH: usize = 64;

fn validate_slug(s: &str) -> Result<(), SlugError> {
    if s.is_empty() {
        return Err(SlugError::Empty);
    }

    if s.len() > MAX_SLUG_LENGTH {
        return Err(SlugError::TooLong {
            max: MAX_SLUG_LENGTH,
        });
    }

    let first = s.chars().next().ok_or(SlugError::Empty)?;
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return Err(SlugError::InvalidStart);
    }

    for c in s.chars() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
            return Err(SlugError::InvalidChar { found: c });
        }
    }

    Ok(())
}

/// The slug of a document collection (e.g. `products`, `blog-posts`).
///
/// ## Constraints
///
/// - Length: 1-64 characters
/// - Characters: lowercase ASCII letters, digits, `-`, `_`
/// - Must start with a letter or digit
///
/// ## Examples
///
/// ```
/// use marula_core::CollectionName;
///
/// assert!(CollectionName::parse("products").is_ok());
/// assert!(CollectionName::parse("blog-posts").is_ok());
///
/// assert!(CollectionName::parse("").is_err());          // empty
/// assert!(CollectionName::parse("Products").is_err());  // uppercase
/// assert!(CollectionName::parse("a b").is_err());       // whitespace
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    /// Parse a `CollectionName` from a string.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] if the input is empty, too long, or contains
    /// characters outside `[a-z0-9_-]`.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        validate_slug(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Returns the collection name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `CollectionName` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CollectionName {
    type Err = SlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The slug of a global document (e.g. `header`, `site-settings`).
///
/// Globals are singletons: one document per slug, no collection. Same
/// character rules as [`CollectionName`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct GlobalSlug(String);

impl GlobalSlug {
    /// Parse a `GlobalSlug` from a string.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] if the input is empty, too long, or contains
    /// characters outside `[a-z0-9_-]`.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        validate_slug(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Returns the global slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `GlobalSlug` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for GlobalSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GlobalSlug {
    type Err = SlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for GlobalSlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_names() {
        assert!(CollectionName::parse("products").is_ok());
        assert!(CollectionName::parse("blog-posts").is_ok());
        assert!(CollectionName::parse("order_items").is_ok());
        assert!(CollectionName::parse("v2-pages").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(CollectionName::parse(""), Err(SlugError::Empty)));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(65);
        assert!(matches!(
            CollectionName::parse(&long),
            Err(SlugError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_uppercase_rejected() {
        assert!(matches!(
            CollectionName::parse("Products"),
            Err(SlugError::InvalidStart)
        ));
        assert!(matches!(
            CollectionName::parse("blogPosts"),
            Err(SlugError::InvalidChar { found: 'P' })
        ));
    }

    #[test]
    fn test_parse_invalid_start() {
        assert!(matches!(
            CollectionName::parse("-products"),
            Err(SlugError::InvalidStart)
        ));
        assert!(matches!(
            CollectionName::parse("_products"),
            Err(SlugError::InvalidStart)
        ));
    }

    #[test]
    fn test_parse_whitespace_rejected() {
        assert!(matches!(
            CollectionName::parse("blog posts"),
            Err(SlugError::InvalidChar { found: ' ' })
        ));
    }

    #[test]
    fn test_sql_injection_shapes_rejected() {
        assert!(CollectionName::parse("products; drop table document").is_err());
        assert!(CollectionName::parse("products'--").is_err());
    }

    #[test]
    fn test_global_slug_parse() {
        assert!(GlobalSlug::parse("header").is_ok());
        assert!(GlobalSlug::parse("site-settings").is_ok());
        assert!(GlobalSlug::parse("").is_err());
    }

    #[test]
    fn test_display_and_from_str() {
        let name: CollectionName = "products".parse().unwrap();
        assert_eq!(format!("{name}"), "products");
        assert_eq!(name.as_str(), "products");
    }

    #[test]
    fn test_serde_roundtrip() {
        let name = CollectionName::parse("products").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"products\"");

        let parsed: CollectionName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, name);
    }
}
