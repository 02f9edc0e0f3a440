//! Field paths
//!
//! Dot-separated segment names addressing a JSON document; a segment ending in
//! `[]` is an array container (`holdings.electronicAccess[].uri`).
//!
//! Written paths follow one strict rule: an array-marked segment may only be
//! the terminal segment. Element paths of repeatable rules are resolved
//! relative to their array and must not contain arrays themselves.

use std::fmt;

use crate::error::{MappingError, MappingResult};

const ARRAY_MARKER: &str = "[]";

/// One segment of a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    pub array: bool,
}

/// A parsed field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Parse a path, checking segment syntax only.
    pub fn parse(raw: &str) -> MappingResult<Self> {
        let invalid = |reason: &str| MappingError::InvalidFieldPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty path"));
        }

        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            let (name, array) = match part.strip_suffix(ARRAY_MARKER) {
                Some(name) => (name, true),
                None => (part, false),
            };
            if name.is_empty() {
                return Err(invalid("empty segment"));
            }
            if name.contains('[') || name.contains(']') {
                return Err(invalid("misplaced array marker"));
            }
            segments.push(PathSegment {
                name: name.to_string(),
                array,
            });
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// Parse a path that is going to be written: arrays only at the end.
    pub fn parse_writable(raw: &str) -> MappingResult<Self> {
        let path = Self::parse(raw)?;
        let last = path.segments.len() - 1;
        if path.segments[..last].iter().any(|s| s.array) {
            return Err(MappingError::InvalidFieldPath {
                path: path.raw,
                reason: "array-marked segment used as intermediate parent".to_string(),
            });
        }
        Ok(path)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The last segment. Paths always have at least one.
    pub fn terminal(&self) -> &PathSegment {
        &self.segments[self.segments.len() - 1]
    }

    /// Segments leading to the terminal.
    pub fn parents(&self) -> &[PathSegment] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Drop a leading segment naming the entity itself (`holdings.x` -> `x`).
    pub fn strip_root(self, root: Option<&str>) -> Self {
        match root {
            Some(root)
                if self.segments.len() > 1
                    && !self.segments[0].array
                    && self.segments[0].name == root =>
            {
                let segments = self.segments[1..].to_vec();
                Self {
                    raw: render(&segments),
                    segments,
                }
            }
            _ => self,
        }
    }

    /// Path of an element field relative to `array`. Element paths may be
    /// given in full (`holdings.electronicAccess[].uri`) or already relative
    /// (`uri`); either way the result contains no array segment.
    pub fn element_path(&self, array: &FieldPath) -> MappingResult<FieldPath> {
        let relative = if self.segments.len() > array.segments.len()
            && self.segments[..array.segments.len()] == array.segments[..]
        {
            self.segments[array.segments.len()..].to_vec()
        } else {
            self.segments.clone()
        };

        if relative.iter().any(|s| s.array) {
            return Err(MappingError::InvalidFieldPath {
                path: self.raw.clone(),
                reason: "nested arrays are not supported inside repeatable elements".to_string(),
            });
        }

        Ok(Self {
            raw: render(&relative),
            segments: relative,
        })
    }

    /// Name of the last segment; the key used for reference-data lookups.
    pub fn field_name(&self) -> &str {
        &self.terminal().name
    }
}

fn render(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(|s| {
            if s.array {
                format!("{}{}", s.name, ARRAY_MARKER)
            } else {
                s.name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
