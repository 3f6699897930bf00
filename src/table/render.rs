use std::fmt::Write;

use super::{Body, PageItem, TableView};

const MAX_CELL_WIDTH: usize = 48;

/// Render a table view as aligned plain text with a pagination footer.
pub fn render_text(view: &TableView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.title);
    if !view.search.is_empty() {
        let _ = writeln!(out, "search: {}", view.search);
    }
    for filter in view.filters.iter().filter(|f| !f.selected.is_empty()) {
        let _ = writeln!(out, "filter {}: {}", filter.label, filter.selected.join(", "));
    }

    let headers: Vec<String> = view.headers.iter().map(|h| h.label.clone()).collect();
    let rows: Vec<Vec<String>> = match &view.body {
        Body::Loading { skeleton_rows } => {
            let skeleton = vec!["...".to_string(); headers.len()];
            vec![skeleton; (*skeleton_rows).min(3)]
        }
        Body::Empty { text } => {
            let _ = writeln!(out);
            let _ = writeln!(out, "  {}", text);
            return out;
        }
        Body::Rows => view
            .rows
            .iter()
            .map(|row| {
                row.serial
                    .map(|s| s.to_string())
                    .into_iter()
                    .chain(row.cells.iter().map(|c| clip(c)))
                    .collect()
            })
            .collect(),
    };

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(idx) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    write_line(&mut out, &headers, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_line(&mut out, &rule, &widths);
    for row in &rows {
        write_line(&mut out, row, &widths);
    }

    if let Some(p) = &view.pagination {
        let pages: Vec<String> = p
            .pages
            .iter()
            .map(|item| match item {
                PageItem::Page(n) if *n == p.current_page => format!("[{}]", n),
                PageItem::Page(n) => n.to_string(),
                PageItem::Gap => "...".to_string(),
            })
            .collect();
        let _ = write!(out, "\npage {} of {}  {}  ({} per page", p.current_page, p.total_pages, pages.join(" "), p.rows_per_page);
        if let Some(total) = p.total_count {
            let _ = write!(out, ", {} total", total);
        }
        let _ = writeln!(out, ")");
    }

    out
}

fn write_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect();
    let _ = writeln!(out, "{}", padded.join("  ").trim_end());
}

fn clip(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell.to_string();
    }
    let clipped: String = cell.chars().take(MAX_CELL_WIDTH - 1).collect();
    format!("{}…", clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Table, TableState, PLACEHOLDER};
    use serde_json::json;

    #[test]
    fn renders_aligned_rows_and_footer() {
        let table = Table::new("Roles", vec![Column::key("Name", "role_name"), Column::key("Description", "role_description")]);
        let mut state = TableState::new(10);
        state.apply_server_page(4, Some(2), Some(35));

        let text = render_text(&table.view(
            &[json!({"role_name": "DPO", "role_description": "Data protection officer"}), json!({"role_name": "Auditor"})],
            &state,
        ));

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Roles");
        assert!(lines[1].starts_with("#   Name     Description"));
        assert!(lines[3].starts_with("11  DPO      Data protection officer"));
        assert!(lines[4].ends_with(PLACEHOLDER));
        assert!(text.contains("page 2 of 4  1 [2] 3 4  (10 per page, 35 total)"));
    }

    #[test]
    fn empty_view_prints_the_empty_text() {
        let table = Table::new("Webhooks", vec![Column::key("URL", "url")]).empty_text("No Web hooks Available");
        let text = render_text(&table.view(&[], &TableState::new(20)));
        assert!(text.contains("No Web hooks Available"));
        assert!(!text.contains("page "));
    }

    #[test]
    fn long_cells_are_clipped() {
        let long = "x".repeat(100);
        assert_eq!(clip(&long).chars().count(), MAX_CELL_WIDTH);
    }
}
