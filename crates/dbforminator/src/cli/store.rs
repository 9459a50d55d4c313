//! Commands that touch the database: `init`, `submit`, `show`.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use dbforminator::{apply_assignments, cleared, prefilled, LoadedForm};
use dbforminator_db::{
    DbConnection, RecordId, SchemaEvolution, StorageBridge, Submission, SubmissionOutcome,
};
use serde_json::{json, Map};
use tracing::info;

use crate::cli::output::{field_value_json, print_rejection, print_table};
use crate::cli::ConnectionArgs;

pub fn init(form: &LoadedForm, conn_args: &ConnectionArgs, add_missing_columns: bool) -> Result<()> {
    let bridge = if add_missing_columns {
        let config = form
            .bridge
            .config()
            .clone()
            .with_evolution(SchemaEvolution::AddMissingColumns);
        StorageBridge::new(Arc::clone(&form.schema), config)?
    } else {
        form.bridge.clone()
    };

    let descriptor = conn_args.descriptor()?;
    let conn = DbConnection::open(&descriptor, bridge.config().connect_options())?;
    bridge
        .ensure_table(&conn)
        .context("Failed to prepare destination table")?;
    conn.close();

    println!(
        "Table '{}' is ready ({} {})",
        bridge.table(),
        descriptor.dialect(),
        descriptor.display_target()
    );
    Ok(())
}

pub fn submit(
    form: &LoadedForm,
    conn_args: &ConnectionArgs,
    assignments: &[String],
    blank: bool,
    json: bool,
) -> Result<()> {
    let descriptor = conn_args.descriptor()?;
    let base = if blank {
        cleared(&form.schema)
    } else {
        prefilled(&form.schema, Local::now().naive_local())
    };
    let raw = apply_assignments(&form.schema, base, assignments)?;

    let outcome = match Submission::collect(raw).validate(&form.schema) {
        Ok(validated) => validated.persist_scoped(&form.bridge, &descriptor),
        Err(outcome) => outcome,
    };
    info!(state = %outcome.state(), "Submission finished");

    match outcome {
        SubmissionOutcome::Persisted { id } => {
            if json {
                println!("{}", json!({ "status": "persisted", "id": id }));
            } else {
                println!("Saved row {} to '{}'", id, form.bridge.table());
            }
            Ok(())
        }
        SubmissionOutcome::Rejected { rejected, .. } => {
            print_rejection(&rejected, json);
            bail!("Submission rejected: {}", rejected)
        }
        SubmissionOutcome::Failed { error, .. } => {
            Err(anyhow::Error::new(error).context("Failed to save record; nothing was stored"))
        }
    }
}

pub fn show(form: &LoadedForm, conn_args: &ConnectionArgs, row_id: i64, json: bool) -> Result<()> {
    let descriptor = conn_args.descriptor()?;
    let conn = DbConnection::open(&descriptor, form.bridge.config().connect_options())?;
    let row = form.bridge.fetch(RecordId(row_id), &conn)?;
    conn.close();

    let Some(row) = row else {
        bail!("No row {} in table '{}'", row_id, form.bridge.table());
    };

    if json {
        let values: Map<_, _> = row
            .values
            .iter()
            .map(|(id, value)| (id.clone(), field_value_json(value)))
            .collect();
        println!("{}", json!({ "id": row.id, "values": values }));
        return Ok(());
    }

    let rows = row
        .values
        .iter()
        .map(|(id, value)| {
            let label = form
                .schema
                .get(id)
                .map(|decl| decl.label.clone())
                .unwrap_or_default();
            vec![id.clone(), label, value.to_string()]
        })
        .collect();
    println!("Row {} of '{}'", row.id, form.bridge.table());
    print_table(&["ID", "LABEL", "VALUE"], rows);
    Ok(())
}
