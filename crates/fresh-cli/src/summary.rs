use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use fresh_cli::types::{RunResult, TransformReport};
use fresh_model::ChangeAction;
use fresh_transform::RuleSet;

pub fn print_run_summary(result: &RunResult) {
    println!("Run: {}", result.run_dir.display());
    println!("Documents: {}", result.documents);
    if let Some(path) = &result.final_output {
        println!("Final output: {}", path.display());
    }
    println!("Change logs: {}", result.changelogs_dir.display());

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Step"),
        header_cell("Kind"),
        header_cell("Documents"),
        header_cell("Modified"),
        header_cell("Added"),
        header_cell("Updated"),
        header_cell("Deleted"),
        header_cell("Failed"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 2..=7 {
        align_column(&mut table, index, CellAlignment::Right);
    }

    let mut total_added = 0usize;
    let mut total_updated = 0usize;
    let mut total_deleted = 0usize;
    let mut total_failed = 0usize;
    for step in &result.steps {
        total_added += step.totals.added;
        total_updated += step.totals.updated;
        total_deleted += step.totals.deleted;
        total_failed += step.failed;
        table.add_row(vec![
            Cell::new(&step.task)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            dim_cell(step.kind),
            Cell::new(step.documents),
            count_cell(step.modified, Color::Green),
            count_cell(step.totals.added, Color::Green),
            count_cell(step.totals.updated, Color::Yellow),
            count_cell(step.totals.deleted, Color::Magenta),
            count_cell(step.failed, Color::Red),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(result.documents).add_attribute(Attribute::Bold),
        dim_cell("-"),
        count_cell(total_added, Color::Green).add_attribute(Attribute::Bold),
        count_cell(total_updated, Color::Yellow).add_attribute(Attribute::Bold),
        count_cell(total_deleted, Color::Magenta).add_attribute(Attribute::Bold),
        count_cell(total_failed, Color::Red).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");

    if !result.failures.is_empty() {
        eprintln!("Dropped documents:");
        for failure in &result.failures {
            eprintln!("- [{}] {}: {}", failure.task, failure.file_name, failure.message);
        }
    }
}

pub fn print_transform_summary(report: &TransformReport) {
    println!("Document: {} (id {})", report.output.display(), report.document_id);
    println!("Table: {}", report.table);
    if let Some(dir) = &report.changelog_dir {
        println!("Change logs: {}", dir.display());
    }
    println!(
        "Attempts: {}, applied: {}, skipped: {}",
        report.stats.attempts, report.stats.applied, report.stats.skipped
    );
    if report.changes.is_empty() {
        println!("No changes.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Action"),
        header_cell("Field"),
        header_cell("Old value"),
        header_cell("New value"),
    ]);
    apply_table_style(&mut table);
    for change in &report.changes {
        table.add_row(vec![
            action_cell(change.action),
            Cell::new(&change.field),
            Cell::new(&change.old_value),
            Cell::new(&change.new_value),
        ]);
    }
    println!("{table}");
}

pub fn print_rule_sets(rule_sets: &[RuleSet]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Mode"),
        header_cell("Matching"),
        header_cell("Operations"),
        header_cell("Rows"),
        header_cell("Table SHA-256"),
        header_cell("Spec SHA-256"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    for rules in rule_sets {
        let (table_digest, spec_digest) = match rules.provenance() {
            Some(provenance) => (
                short_digest(&provenance.table_sha256),
                short_digest(&provenance.spec_sha256),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        table.add_row(vec![
            Cell::new(rules.table().name())
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(rules.mode()),
            Cell::new(format!("{:?}", rules.spec().matching).to_lowercase()),
            Cell::new(rules.operation_count()),
            Cell::new(rules.table().len()),
            dim_cell(table_digest),
            dim_cell(spec_digest),
        ]);
    }
    println!("{table}");
}

fn short_digest(digest: &str) -> String {
    digest.chars().take(12).collect()
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn action_cell(action: ChangeAction) -> Cell {
    let color = match action {
        ChangeAction::Add => Color::Green,
        ChangeAction::Update => Color::Yellow,
        ChangeAction::Delete => Color::Magenta,
    };
    Cell::new(action).fg(color).add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
