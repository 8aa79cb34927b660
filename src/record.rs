// 📋 In-memory table shared by every stage
// Stages consume a Table and hand back a new one; nothing is mutated in place.

use serde::Serialize;

/// One CSV row. Values line up with `Table::columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Line in the source file (header is line 1)
    pub line_number: usize,
    pub values: Vec<String>,
}

impl Record {
    pub fn new(line_number: usize, values: Vec<String>) -> Self {
        Record { line_number, values }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Table { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Same columns, different rows
    pub fn with_rows(&self, rows: Vec<Record>) -> Table {
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_lookup() {
        let table = Table::new(
            vec!["name".to_string(), "address".to_string()],
            vec![Record::new(2, vec!["Ann".to_string(), "x".to_string()])],
        );

        assert_eq!(table.column_index("address"), Some(1));
        assert_eq!(table.column_index("missing"), None);
        assert_eq!(table.rows[0].get(0), Some("Ann"));
        assert_eq!(table.rows[0].get(5), None);
        assert_eq!(table.len(), 1);
    }
}
