//! `template`: field descriptions for an external renderer, as JSON.

use anyhow::{Context, Result};
use chrono::Local;
use dbforminator::{templates, LoadedForm};
use serde_json::json;

pub fn run(form: &LoadedForm) -> Result<()> {
    let now = Local::now().naive_local();
    let payload = json!({
        "title": form.title,
        "table": form.bridge.table(),
        "fields": templates(&form.schema, now),
    });
    let text = serde_json::to_string_pretty(&payload).context("Failed to render template")?;
    println!("{}", text);
    Ok(())
}
