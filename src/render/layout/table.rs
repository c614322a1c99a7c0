//! Table geometry and row styling

use crate::config::TableSettings;
use crate::model::{Color, Record, TableColumn};

/// Scale nominal column widths so they sum to `usable_width`
pub fn scale_columns(columns: &[TableColumn], usable_width: f32) -> Vec<f32> {
    let total: f32 = columns.iter().map(|c| c.width.max(0.0)).sum();
    if columns.is_empty() {
        return Vec::new();
    }
    if total <= 0.0 {
        let equal = usable_width / columns.len() as f32;
        return vec![equal; columns.len()];
    }

    let scale = usable_width / total;
    columns.iter().map(|c| c.width.max(0.0) * scale).collect()
}

/// Background fill for a data row: (color, opacity)
pub fn row_background(settings: &TableSettings, row_index: usize) -> (Color, f32) {
    if row_index % 2 == 0 {
        (settings.even_row_background, 1.0)
    } else {
        (settings.odd_row_background, settings.odd_row_opacity)
    }
}

/// Accent color for a status value
pub fn status_color(settings: &TableSettings, value: &str) -> Color {
    match value.trim().to_lowercase().as_str() {
        "pending" => settings.pending,
        "failed" => settings.failed,
        "paid" => settings.paid,
        _ => settings.text,
    }
}

/// Text color of one cell
pub fn cell_color(settings: &TableSettings, column: &TableColumn, row: &Record) -> Color {
    if column.field_key == settings.muted_field {
        return settings.muted_text;
    }
    if column.field_key == settings.status_field {
        let value = row
            .get(&column.field_key)
            .map(|v| v.display())
            .unwrap_or_default();
        return status_color(settings, &value);
    }
    settings.text
}

/// Display text of one cell
pub fn cell_text(column: &TableColumn, row: &Record) -> String {
    row.get(&column.field_key)
        .map(|v| v.display())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::model::Scalar;

    #[test]
    fn test_scaled_widths_sum_to_usable() {
        let columns = Settings::default().table.columns;
        for usable in [515.28_f32, 720.0, 300.0, 1111.1] {
            let widths = scale_columns(&columns, usable);
            let sum: f32 = widths.iter().sum();
            assert!((sum - usable).abs() < 0.01, "{} != {}", sum, usable);
            // Proportions preserved: email is 4x the id column
            assert!((widths[2] / widths[0] - 4.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_zero_width_columns_split_evenly() {
        let columns = vec![TableColumn::new("A", "a", 0.0), TableColumn::new("B", "b", 0.0)];
        assert_eq!(scale_columns(&columns, 100.0), vec![50.0, 50.0]);
    }

    #[test]
    fn test_row_parity() {
        let table = Settings::default().table;
        assert_eq!(row_background(&table, 0), (Color::gray(1.0), 1.0));
        assert_eq!(row_background(&table, 1), (Color::gray(0.94), 0.3));
        assert_eq!(row_background(&table, 2).1, 1.0);
    }

    #[test]
    fn test_status_and_muted_colors() {
        let table = Settings::default().table;
        let status = TableColumn::new("Status", "status", 80.0);
        let email = TableColumn::new("Email", "email", 200.0);

        let mut row = Record::new();
        row.insert("status".into(), Scalar::Text("PENDING".into()));
        row.insert("email".into(), Scalar::Text("a@b.c".into()));
        assert_eq!(cell_color(&table, &status, &row), table.pending);
        assert_eq!(cell_color(&table, &email, &row), table.muted_text);

        row.insert("status".into(), Scalar::Text("unknown".into()));
        assert_eq!(cell_color(&table, &status, &row), table.text);
        assert_eq!(status_color(&table, "failed"), table.failed);
        assert_eq!(status_color(&table, "paid"), table.paid);
    }

    #[test]
    fn test_missing_cell_is_blank() {
        let column = TableColumn::new("Date", "date", 100.0);
        assert_eq!(cell_text(&column, &Record::new()), "");
    }
}
