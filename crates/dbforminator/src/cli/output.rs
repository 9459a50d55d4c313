//! Output formatting for CLI commands

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use dbforminator_schema::{FieldValue, RecordRejected};
use serde_json::{json, Value};

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    let header: Vec<Cell> = headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)).collect();
    table.set_header(header);
    for row in rows {
        table.add_row(row);
    }
    println!("{}", table);
}

/// Field-level feedback for a rejected submission, on stderr.
pub fn print_rejection(rejected: &RecordRejected, json: bool) {
    if json {
        println!("{}", json!({ "status": "rejected", "failures": rejected.failures }));
        return;
    }
    eprintln!("Submission rejected:");
    for failure in &rejected.failures {
        eprintln!("  {}: {}", failure.field, failure.error);
    }
}

/// Plain JSON for a stored value. Decimals stay strings to keep their scale.
pub fn field_value_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(s) | FieldValue::DateTime(s) => Value::String(s.clone()),
        FieldValue::Integer(n) => json!(n),
        FieldValue::Decimal(d) => Value::String(d.to_string()),
        FieldValue::Boolean(b) => Value::Bool(*b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_field_value_json() {
        assert_eq!(field_value_json(&FieldValue::Null), Value::Null);
        assert_eq!(field_value_json(&FieldValue::Integer(30)), json!(30));
        assert_eq!(
            field_value_json(&FieldValue::Decimal(Decimal::new(250, 2))),
            json!("2.50")
        );
        assert_eq!(field_value_json(&FieldValue::Boolean(true)), json!(true));
    }
}
