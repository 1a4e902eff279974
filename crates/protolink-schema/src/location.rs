use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a declaration came from: `base` is the source root, `path` is
/// relative to it. Line and column are 1-based; `-1` means unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub base: String,
    pub path: String,
    pub line: i32,
    pub column: i32,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            base: String::new(),
            path: String::new(),
            line: -1,
            column: -1,
        }
    }
}

impl Location {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_base(base: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn at(&self, line: i32, column: i32) -> Self {
        Self {
            line,
            column,
            ..self.clone()
        }
    }

    pub fn without_base(&self) -> Self {
        Self {
            base: String::new(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.base.is_empty() {
            write!(f, "{}/", self.base.trim_end_matches('/'))?;
        }
        f.write_str(&self.path)?;
        if self.line != -1 {
            write!(f, ":{}", self.line)?;
            if self.column != -1 {
                write!(f, ":{}", self.column)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_omits_unknown_positions() {
        assert_eq!(Location::get("a/b.proto").to_string(), "a/b.proto");
        assert_eq!(Location::get("a/b.proto").at(3, 5).to_string(), "a/b.proto:3:5");
        assert_eq!(Location::get("a/b.proto").at(3, -1).to_string(), "a/b.proto:3");
        assert_eq!(
            Location::with_base("/src/", "b.proto").at(1, 1).to_string(),
            "/src/b.proto:1:1"
        );
    }
}
