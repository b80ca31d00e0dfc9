//! Table layout configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A column addressed by header name or by 0-based index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "#{}", i),
            ColumnRef::Name(name) => write!(f, "\"{}\"", name),
        }
    }
}

/// Record fields mapped to input columns. Unset fields use the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Stable record id. Without it the 0-based data row index is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ColumnRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<ColumnRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issn: Option<ColumnRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<ColumnRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<ColumnRef>,
}

/// Input and output table settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Whether the first row holds column names.
    #[serde(default = "default_has_headers")]
    pub has_headers: bool,

    /// Field delimiter, a single ASCII character.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    #[serde(default)]
    pub columns: ColumnMapping,
}

fn default_has_headers() -> bool {
    true
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            has_headers: default_has_headers(),
            delimiter: default_delimiter(),
            columns: ColumnMapping::default(),
        }
    }
}

impl TableConfig {
    /// Delimiter as a byte, if it is a single ASCII character.
    pub fn delimiter_byte(&self) -> Option<u8> {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => Some(*b),
            _ => None,
        }
    }

    /// Default column for a field: header names with headers, the
    /// `isbn, issn, author, title` positions without.
    pub(crate) fn default_column(&self, field: Field) -> Option<ColumnRef> {
        if self.has_headers {
            return match field {
                Field::Id => None,
                other => Some(ColumnRef::Name(other.as_str().to_string())),
            };
        }
        match field {
            Field::Id => None,
            Field::Isbn => Some(ColumnRef::Index(0)),
            Field::Issn => Some(ColumnRef::Index(1)),
            Field::Author => Some(ColumnRef::Index(2)),
            Field::Title => Some(ColumnRef::Index(3)),
        }
    }

    /// Explicitly configured column for a field.
    pub(crate) fn configured_column(&self, field: Field) -> Option<&ColumnRef> {
        match field {
            Field::Id => self.columns.id.as_ref(),
            Field::Isbn => self.columns.isbn.as_ref(),
            Field::Issn => self.columns.issn.as_ref(),
            Field::Author => self.columns.author.as_ref(),
            Field::Title => self.columns.title.as_ref(),
        }
    }
}

/// Record fields read from a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Id,
    Isbn,
    Issn,
    Author,
    Title,
}

impl Field {
    pub(crate) const ALL: [Field; 5] = [
        Field::Id,
        Field::Isbn,
        Field::Issn,
        Field::Author,
        Field::Title,
    ];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Isbn => "isbn",
            Field::Issn => "issn",
            Field::Author => "author",
            Field::Title => "title",
        }
    }
}
