//! Data exchanged with the execution collaborator
//!
//! [`ParameterBag`] carries bound values out, [`ResultRow`] carries flat rows
//! back in.

use type_mapping::SqlValue;

/// Ordered, append-only `name -> value` parameters of one statement
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBag {
    prefix: String,
    entries: Vec<(String, SqlValue)>,
}

impl Default for ParameterBag {
    fn default() -> Self {
        Self::new("@p")
    }
}

impl ParameterBag {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Vec::new(),
        }
    }

    /// Append a value and return the placeholder naming it
    pub fn push(&mut self, value: SqlValue) -> String {
        let name = format!("{}{}", self.prefix, self.entries.len());
        self.entries.push((name.clone(), value));
        name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One flat result row, columns named `{alias}_{field}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    columns: Vec<(String, SqlValue)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, convenient for fixtures
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Look a column up by exact name, then case-insensitively.
    ///
    /// PostgreSQL folds unquoted aliases such as `Extend0_id` to lower case.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
            })
            .map(|(_, v)| v)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, SqlValue)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        let mut row = ResultRow::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}
