use crate::cli::output::{CliOutput, CommandData, QueryData};

use std::fmt::Write;


pub fn setup_logging(verbose: u8, quiet: bool, json: bool) {
    let result = if json {
        // Logs would interleave with the JSON document on stdout.
        tracing::subscriber::set_global_default(tracing::subscriber::NoSubscriber::default())
    } else {
        let level = if quiet {
            tracing::Level::ERROR
        } else { match verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }};

        let subscriber = tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
    };

    if let Err(e) = result {
        eprintln!("Failed to set global default subscriber: {e}");
    }
}


pub fn render_human_output(output: &CliOutput) {
    if let Some(message) = &output.message {
        tracing::error!("{} failed: {}", output.command, message);
        return;
    }

    match &output.data {
        Some(CommandData::Query(data)) => print!("{}", render_table(data)),
        Some(CommandData::Exec(data)) => match &data.job_id {
            Some(job_id) => println!("Submitted job {job_id} (operation {})", data.operation_handle),
            None => println!(
                "{} (operation {})",
                data.result_kind.as_deref().unwrap_or("OK"),
                data.operation_handle
            ),
        },
        Some(CommandData::Info(info)) => println!("{} {}", info.product_name, info.version),
        None => {}
    }
}

/// Tab-separated rows under a header line, followed by a row count.
pub fn render_table(data: &QueryData) -> String {
    let mut out = String::new();

    let header: Vec<_> = data
        .columns
        .iter()
        .map(|c| format!("{} ({})", c.name, c.type_name))
        .collect();
    let _ = writeln!(&mut out, "op\t{}", header.join("\t"));

    for row in &data.rows {
        let cells: Vec<_> = row
            .values
            .iter()
            .map(|v| match v {
                serde_json::Value::Null => "NULL".to_string(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        let _ = writeln!(&mut out, "{}\t{}", row.kind, cells.join("\t"));
    }

    let _ = writeln!(
        &mut out,
        "({} row{}{})",
        data.rows.len(),
        if data.rows.len() == 1 { "" } else { "s" },
        if data.truncated { ", truncated" } else { "" }
    );
    out
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::output::{ColumnJson, RowJson};
    use serde_json::json;

    #[test]
    fn table_lists_rows_with_their_kind() {
        let data = QueryData {
            columns: vec![
                ColumnJson { name: "id".into(), type_name: "BIGINT NOT NULL".into() },
                ColumnJson { name: "name".into(), type_name: "VARCHAR".into() },
            ],
            rows: vec![
                RowJson { kind: "+I", values: vec![json!(1), json!("alice")] },
                RowJson { kind: "-D", values: vec![json!(2), json!(null)] },
            ],
            truncated: false,
        };

        assert_eq!(
            render_table(&data),
            "op\tid (BIGINT NOT NULL)\tname (VARCHAR)\n+I\t1\talice\n-D\t2\tNULL\n(2 rows)\n"
        );
    }
}
