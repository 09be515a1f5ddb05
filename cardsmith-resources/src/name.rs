//! Resource names: `<ownerPrefix>/<kindPlural>/<identifier>`

use std::fmt;
use std::str::FromStr;

use crate::error::{ResourceError, Result};
use crate::kind::ResourceKind;

/// Longest identifier accepted
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Check an identifier against the naming grammar: 1-64 characters from
/// `A-Z a-z 0-9 _ -`.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(ResourceError::invalid_identifier(identifier, "empty"));
    }
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(ResourceError::invalid_identifier(
            identifier,
            format!("longer than {MAX_IDENTIFIER_LEN} characters"),
        ));
    }
    if let Some(bad) = identifier
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(ResourceError::invalid_identifier(
            identifier,
            format!("character '{bad}' is not allowed"),
        ));
    }
    Ok(())
}

/// Fully qualified resource name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceName {
    pub prefix: String,
    pub kind: ResourceKind,
    pub identifier: String,
}

impl ResourceName {
    pub fn new(
        prefix: impl Into<String>,
        kind: ResourceKind,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            kind,
            identifier: identifier.into(),
        }
    }

    /// Does `query` refer to this resource? Accepts the bare identifier or
    /// the full name, with or without a `.json` extension.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.strip_suffix(".json").unwrap_or(query);
        if query.contains('/') {
            self.to_string() == query
        } else {
            self.identifier == query
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.prefix, self.kind, self.identifier)
    }
}

impl FromStr for ResourceName {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(kind), Some(identifier), None) if !prefix.is_empty() => {
                let kind = kind.parse()?;
                validate_identifier(identifier)?;
                Ok(Self::new(prefix, kind, identifier))
            }
            _ => Err(ResourceError::invalid_name(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("simple").is_ok());
        assert!(validate_identifier("My_type-2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier("dot.json").is_err());
        assert!(validate_identifier(&"x".repeat(64)).is_ok());
        assert!(validate_identifier(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_parse_and_display() {
        let name: ResourceName = "proj/cardTypes/simple".parse().unwrap();
        assert_eq!(name.prefix, "proj");
        assert_eq!(name.kind, ResourceKind::CardTypes);
        assert_eq!(name.identifier, "simple");
        assert_eq!(name.to_string(), "proj/cardTypes/simple");

        assert!("proj/cardTypes".parse::<ResourceName>().is_err());
        assert!("proj/things/simple".parse::<ResourceName>().is_err());
        assert!("/cardTypes/simple".parse::<ResourceName>().is_err());
        assert!("a/cardTypes/b/c".parse::<ResourceName>().is_err());
    }

    #[test]
    fn test_matches_is_tolerant() {
        let name = ResourceName::new("proj", ResourceKind::CardTypes, "simple");
        assert!(name.matches("simple"));
        assert!(name.matches("simple.json"));
        assert!(name.matches("proj/cardTypes/simple"));
        assert!(name.matches("proj/cardTypes/simple.json"));
        assert!(!name.matches("other/cardTypes/simple"));
        assert!(!name.matches("simpler"));
    }
}
