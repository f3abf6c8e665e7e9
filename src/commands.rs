//! Command execution.

use crate::Commands;
use colored::Colorize;
use futures::StreamExt;
use riak_client::RiakClient;
use riak_protocol::{Cell, QueryResult, Row};
use serde_json::Value;

/// Executes a command and returns the formatted output.
pub async fn execute(client: &RiakClient, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Ping => {
            client.ping().await?;
            Ok("PONG".green().to_string())
        }

        Commands::Info => {
            let info = client.server_info().await?;
            Ok(format_json(&serde_json::to_value(&info)?))
        }

        Commands::ListBuckets { bucket_type } => {
            let buckets = client.list_buckets(bucket_type.as_deref()).await?;
            if buckets.is_empty() {
                return Ok("No buckets".yellow().to_string());
            }
            Ok(buckets.join("\n"))
        }

        Commands::ListKeys {
            bucket,
            bucket_type,
            stream,
        } => {
            if !stream {
                let keys = client.list_keys(bucket_type.as_deref(), &bucket).await?;
                if keys.is_empty() {
                    return Ok(format!("No keys in {}", bucket.cyan()));
                }
                return Ok(keys.iter().map(|k| display_key(k)).collect::<Vec<_>>().join("\n"));
            }

            let mut pages = client.stream_keys(bucket_type.as_deref(), &bucket).await?;
            let mut count = 0usize;
            while let Some(page) = pages.next().await {
                for key in page? {
                    println!("{}", display_key(&key));
                    count += 1;
                }
            }
            Ok(format!("{} {} keys", "Listed".green(), count))
        }

        Commands::TsGet { table, key } => {
            let key = parse_cells(&parse_json_arg(&key)?)?;
            let result = client.ts_get(&table, key).await?;
            if result.is_empty() {
                return Ok("Not found".yellow().to_string());
            }
            Ok(format_result(&result))
        }

        Commands::TsPut { table, rows } => {
            let rows = parse_rows(&parse_json_arg(&rows)?)?;
            let count = rows.len();
            client.ts_put(&table, rows).await?;
            Ok(format!("{} {} rows to {}", "Wrote".green(), count, table.cyan()))
        }

        Commands::TsDelete { table, key } => {
            let key = parse_cells(&parse_json_arg(&key)?)?;
            client.ts_delete(&table, key).await?;
            Ok(format!("{} from {}", "Deleted".green(), table.cyan()))
        }

        Commands::TsQuery { query } => {
            let result = client.ts_query(&query).await?;
            if result.columns.is_empty() && result.is_empty() {
                return Ok("OK".green().to_string());
            }
            Ok(format_result(&result))
        }

        Commands::TsListKeys { table } => {
            let keys = client.ts_list_keys(&table).await?;
            if keys.is_empty() {
                return Ok(format!("No keys in {}", table.cyan()));
            }
            Ok(format_json(&serde_json::to_value(&keys)?))
        }
    }
}

/// Parses a JSON argument, reading it from a file when prefixed with `@`.
fn parse_json_arg(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => arg.to_string(),
    };
    Ok(serde_json::from_str(&text)?)
}

fn parse_cell(value: &Value) -> Result<Cell, Box<dyn std::error::Error>> {
    Ok(match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Boolean(*b),
        Value::String(s) => Cell::Varchar(s.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Sint64(i),
            None => Cell::Double(n.as_f64().ok_or("number out of range")?),
        },
        other => return Err(format!("unsupported cell value: {}", other).into()),
    })
}

fn parse_cells(value: &Value) -> Result<Vec<Cell>, Box<dyn std::error::Error>> {
    value
        .as_array()
        .ok_or("expected a JSON array of cells")?
        .iter()
        .map(parse_cell)
        .collect()
}

fn parse_rows(value: &Value) -> Result<Vec<Row>, Box<dyn std::error::Error>> {
    value
        .as_array()
        .ok_or("expected a JSON array of rows")?
        .iter()
        .map(|row| parse_cells(row).map(Row::new))
        .collect()
}

fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

fn format_result(result: &QueryResult) -> String {
    let header = result
        .columns
        .iter()
        .map(|c| format!("{} ({})", c.name, c.column_type))
        .collect::<Vec<_>>()
        .join(" | ");

    let mut output = header.bold().to_string();
    for row in &result.rows {
        let cells = row
            .cells
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" | ");
        output.push('\n');
        output.push_str(&cells);
    }
    output.push_str(&format!("\n{}", format!("({} rows)", result.rows.len()).dimmed()));
    output
}

fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
