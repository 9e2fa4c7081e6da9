//! Typed field paths into a structure draft.
//!
//! A path is a sequence of map keys and array indices. The dotted form
//! `adGroups.0.exactKeywords` parses to
//! `[Key("adGroups"), Index(0), Key("exactKeywords")]`: all-digit segments
//! become indices, everything else a key.

use std::fmt;
use std::str::FromStr;

use super::DraftError;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Address of a value inside a structure draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The empty path (the draft root).
    pub fn root() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The containing path and the final segment, or `None` at the root.
    pub fn split_last(&self) -> Option<(FieldPath, &PathSegment)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            FieldPath {
                segments: parent.to_vec(),
            },
            last,
        ))
    }
}

impl FromStr for FieldPath {
    type Err = DraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(DraftError::InvalidPath {
                path: s.to_string(),
                reason: "path is empty".to_string(),
            });
        }

        let mut segments = Vec::new();
        for part in s.split('.') {
            if part.is_empty() {
                return Err(DraftError::InvalidPath {
                    path: s.to_string(),
                    reason: "empty segment".to_string(),
                });
            }
            if part.bytes().all(|b| b.is_ascii_digit()) {
                let index = part.parse().map_err(|_| DraftError::InvalidPath {
                    path: s.to_string(),
                    reason: format!("index {part} is too large"),
                })?;
                segments.push(PathSegment::Index(index));
            } else {
                segments.push(PathSegment::Key(part.to_string()));
            }
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_and_indices() {
        let path: FieldPath = "adGroups.0.name".parse().unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("adGroups".into()),
                PathSegment::Index(0),
                PathSegment::Key("name".into()),
            ]
        );
        assert_eq!(path, FieldPath::root().key("adGroups").index(0).key("name"));
    }

    #[test]
    fn display_round_trips() {
        let path: FieldPath = "settings.geography.locations.2".parse().unwrap();
        assert_eq!(path.to_string(), "settings.geography.locations.2");
    }

    #[test]
    fn rejects_empty_segments() {
        assert!("".parse::<FieldPath>().is_err());
        assert!("adGroups..name".parse::<FieldPath>().is_err());
        assert!("adGroups.".parse::<FieldPath>().is_err());
    }

    #[test]
    fn mixed_segment_is_a_key() {
        let path: FieldPath = "path1".parse().unwrap();
        assert_eq!(path.segments(), &[PathSegment::Key("path1".into())]);
    }
}
