use serde_json::Value;
use tickscan_core::Envelope;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(
    envelope: &Envelope<Value>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => print!("{}", render_table(envelope)?),
    }

    Ok(())
}

fn render_table(envelope: &Envelope<Value>) -> Result<String, CliError> {
    let mut out = String::new();
    let mut line = |text: String| {
        out.push_str(&text);
        out.push('\n');
    };

    line(format!("request_id  : {}", envelope.meta.request_id));
    line(format!("schema      : {}", envelope.meta.schema_version));
    line(format!(
        "generated_at: {}",
        envelope.meta.generated_at.format_display()
    ));
    line(format!(
        "sources     : {}",
        envelope
            .meta
            .source_chain
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",")
    ));
    line(format!("latency_ms  : {}", envelope.meta.latency_ms));

    if !envelope.meta.warnings.is_empty() {
        line(String::from("warnings:"));
        for warning in &envelope.meta.warnings {
            line(format!("  - {warning}"));
        }
    }

    match rows(&envelope.data) {
        Some(rows) if !rows.is_empty() => {
            line(String::from("results:"));
            for row_line in format_rows(rows) {
                line(format!("  {row_line}"));
            }
        }
        _ => {
            line(String::from("data:"));
            let pretty_data = serde_json::to_string_pretty(&envelope.data)?;
            for data_line in pretty_data.lines() {
                line(format!("  {data_line}"));
            }
        }
    }

    if !envelope.errors.is_empty() {
        line(String::from("errors:"));
        for error in &envelope.errors {
            match &error.ticker {
                Some(ticker) => line(format!("  - {ticker} {}: {}", error.code, error.message)),
                None => line(format!("  - {}: {}", error.code, error.message)),
            }
        }
    }

    Ok(out)
}

/// The `results` array when every entry is a flat object.
fn rows(data: &Value) -> Option<&Vec<Value>> {
    let rows = data.get("results")?.as_array()?;
    rows.iter()
        .all(|row| {
            row.as_object()
                .is_some_and(|fields| fields.values().all(|v| !v.is_object() && !v.is_array()))
        })
        .then_some(rows)
}

fn format_rows(rows: &[Value]) -> Vec<String> {
    let Some(first) = rows.first().and_then(Value::as_object) else {
        return Vec::new();
    };
    let columns: Vec<&String> = first.keys().collect();

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| cell(row.get(column.as_str()).unwrap_or(&Value::Null)))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let join = |values: Vec<String>| {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_owned()
    };

    std::iter::once(join(columns.iter().map(|c| (*c).clone()).collect()))
        .chain(cells.into_iter().map(join))
        .collect()
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(v) if number.is_f64() => format!("{v:.2}"),
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tickscan_core::{EnvelopeMeta, ProviderId};

    use super::*;

    fn envelope(data: Value) -> Envelope<Value> {
        let meta = EnvelopeMeta::new("request-12345", vec![ProviderId::Krx], 5).expect("meta");
        Envelope::success(meta, data)
    }

    #[test]
    fn renders_flat_results_as_columns() {
        let text = render_table(&envelope(json!({
            "results": [
                {"ticker": "005930", "rsi": 28.456, "market_cap": null},
                {"ticker": "000660", "rsi": 35.0, "market_cap": 1000}
            ]
        })))
        .expect("renders");

        assert!(text.contains("results:"));
        assert!(text.contains("market_cap  rsi    ticker"));
        assert!(text.contains("28.46  005930"));
        assert!(text.contains("1000        35.00  000660"));
    }

    #[test]
    fn falls_back_to_json_for_nested_data() {
        let text = render_table(&envelope(json!({"results": [{"ticker": "AAPL", "k": {"a": 1}}]})))
            .expect("renders");
        assert!(text.contains("data:"));
        assert!(!text.contains("results:\n"));
    }
}
