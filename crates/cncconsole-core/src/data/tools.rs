//! Tool table
//!
//! Parses the controller's tool table file and answers the two questions the
//! console asks of it: what is the diameter of the mounted tool (for surface
//! speed) and what is its comment (for the tool change prompt).
//!
//! Line format: `T<n> P<pocket> [D<diameter>] [;comment]`. Other words
//! (`Z`, `X`, orientation, ...) are accepted and ignored.

use crate::error::ToolTableError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Text shown when no tool is mounted
pub const NO_TOOL_LOADED: &str = "NO TOOL LOADED";

/// One row of the tool table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEntry {
    /// Tool number (`T` word)
    pub number: u32,
    /// Pocket (`P` word)
    pub pocket: u32,
    /// Cutting diameter in machine units
    pub diameter: f64,
    /// Free text after `;`
    pub comment: String,
}

impl ToolEntry {
    /// Create an entry without a comment
    pub fn new(number: u32, pocket: u32, diameter: f64) -> Self {
        Self {
            number,
            pocket,
            diameter,
            comment: String::new(),
        }
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Parse a single tool table line. Returns `Ok(None)` for blank and comment-only lines.
    pub fn parse_line(line: &str, line_number: usize) -> Result<Option<Self>, ToolTableError> {
        let (words, comment) = match line.split_once(';') {
            Some((w, c)) => (w, c.trim()),
            None => (line, ""),
        };
        let words = words.trim();
        if words.is_empty() {
            return Ok(None);
        }

        let invalid = |reason: String| ToolTableError::InvalidLine {
            line_number,
            reason,
        };

        let mut number = None;
        let mut pocket = None;
        let mut diameter = 0.0;

        for word in words.split_whitespace() {
            let mut chars = word.chars();
            let letter = chars.next().map(|c| c.to_ascii_uppercase());
            let value = chars.as_str();
            match letter {
                Some('T') => {
                    number = Some(
                        value
                            .parse::<u32>()
                            .map_err(|_| invalid(format!("bad tool number '{}'", word)))?,
                    )
                }
                Some('P') => {
                    pocket = Some(
                        value
                            .parse::<u32>()
                            .map_err(|_| invalid(format!("bad pocket '{}'", word)))?,
                    )
                }
                Some('D') => {
                    diameter = value
                        .parse::<f64>()
                        .map_err(|_| invalid(format!("bad diameter '{}'", word)))?
                }
                _ => {}
            }
        }

        let number = number.ok_or_else(|| invalid("missing T word".to_string()))?;
        Ok(Some(Self {
            number,
            pocket: pocket.unwrap_or(number),
            diameter,
            comment: comment.to_string(),
        }))
    }
}

impl fmt::Display for ToolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{} P{} D{}", self.number, self.pocket, self.diameter)?;
        if !self.comment.is_empty() {
            write!(f, " ;{}", self.comment)?;
        }
        Ok(())
    }
}

/// Tool table keyed by tool number
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolTable {
    tools: BTreeMap<u32, ToolEntry>,
}

impl ToolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the full contents of a tool table file
    pub fn parse(contents: &str) -> Result<Self, ToolTableError> {
        let mut table = Self::new();
        for (idx, line) in contents.lines().enumerate() {
            if let Some(entry) = ToolEntry::parse_line(line, idx + 1)? {
                table.insert(entry);
            }
        }
        Ok(table)
    }

    /// Add or replace an entry
    pub fn insert(&mut self, entry: ToolEntry) {
        self.tools.insert(entry.number, entry);
    }

    /// Look up a tool
    pub fn lookup(&self, number: u32) -> Option<&ToolEntry> {
        self.tools.get(&number)
    }

    /// Look up a tool, failing if it is missing
    pub fn require(&self, number: u32) -> Result<&ToolEntry, ToolTableError> {
        self.lookup(number)
            .ok_or(ToolTableError::ToolNotFound { tool_number: number })
    }

    /// Diameter of a tool, 0 for tool 0 or unknown tools
    pub fn diameter(&self, number: u32) -> f64 {
        self.lookup(number).map(|t| t.diameter).unwrap_or(0.0)
    }

    /// Description shown next to the mounted tool
    pub fn description(&self, number: u32) -> String {
        if number == 0 {
            return NO_TOOL_LOADED.to_string();
        }
        self.lookup(number)
            .map(|t| t.comment.clone())
            .unwrap_or_default()
    }

    /// Iterate in tool number order
    pub fn iter(&self) -> impl Iterator<Item = &ToolEntry> {
        self.tools.values()
    }

    /// Number of tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True if the table has no tools
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the table back into file form
    pub fn to_file_contents(&self) -> String {
        self.iter().map(|t| format!("{}\n", t)).collect()
    }
}
