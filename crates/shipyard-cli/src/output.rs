//! Formatted output helpers for CLI commands.
//!
//! Renders left-aligned, space-padded tables for listing commands.

/// Spaces between columns.
const COLUMN_GAP: usize = 3;

/// A plain-text table with a header row.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table with the given column headers.
    #[must_use]
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(ToString::to_string).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. Missing cells render empty; extra cells are dropped.
    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Renders the header and every row, one line each.
    #[must_use]
    pub fn render(&self) -> String {
        let widths: Vec<usize> = (0..self.headers.len())
            .map(|col| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .chain(std::iter::once(&self.headers[col]))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        for row in std::iter::once(&self.headers).chain(&self.rows) {
            let mut line = String::new();
            for (col, width) in widths.iter().enumerate() {
                let cell = row.get(col).map_or("", String::as_str);
                if col + 1 == widths.len() {
                    line.push_str(cell);
                } else {
                    line.push_str(&format!("{cell:<width$}", width = width + COLUMN_GAP));
                }
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_renders_header_only() {
        let table = Table::new(&["ID", "NAME"]);
        assert_eq!(table.render(), "ID   NAME\n");
    }

    #[test]
    fn columns_align_to_widest_cell() {
        let mut table = Table::new(&["ID", "NAME", "STATUS"]);
        table.add_row(vec!["1234567890".into(), "c1".into(), "running".into()]);
        table.add_row(vec!["42".into(), "web-server".into(), "stopped".into()]);

        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "ID           NAME         STATUS");
        assert_eq!(lines[1], "1234567890   c1           running");
        assert_eq!(lines[2], "42           web-server   stopped");
    }

    #[test]
    fn short_rows_are_padded() {
        let mut table = Table::new(&["A", "B"]);
        table.add_row(vec!["x".into()]);
        assert_eq!(table.render(), "A   B\nx\n");
    }
}
