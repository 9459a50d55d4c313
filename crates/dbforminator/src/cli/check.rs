//! `check`: validate the form configuration and show the resulting table layout.

use anyhow::Result;
use dbforminator::LoadedForm;
use dbforminator_db::Dialect;
use dbforminator_schema::{column_type_for, validator_for};

use crate::cli::output::print_table;

pub fn run(form: &LoadedForm, dialect: &str) -> Result<()> {
    let dialect: Dialect = dialect.parse()?;

    println!("{} ({})", form.title, form.path.display());
    println!(
        "Table {} with {} field(s), primary key {}",
        dialect.quote_ident(form.bridge.table()),
        form.schema.len(),
        dialect.quote_ident(&form.bridge.config().primary_key)
    );

    let rows = form
        .schema
        .iter()
        .map(|decl| {
            let constraint = validator_for(decl).constraint();
            let mut limits = Vec::new();
            if let Some(max_length) = constraint.max_length {
                limits.push(format!("max_length={}", max_length));
            }
            if let Some(precision) = constraint.precision {
                limits.push(format!("precision={}", precision));
            }
            if let Some(default) = &decl.default {
                limits.push(format!("default={}", default));
            }
            vec![
                decl.id.clone(),
                decl.label.clone(),
                constraint.type_name,
                dialect.column_type(column_type_for(decl)),
                limits.join(", "),
            ]
        })
        .collect();
    print_table(&["ID", "LABEL", "TYPE", "COLUMN", "CONSTRAINTS"], rows);

    println!();
    println!("{};", form.bridge.create_table_sql(dialect));
    Ok(())
}
