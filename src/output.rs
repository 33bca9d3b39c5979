use colored::Colorize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Format {
    Json,
    Table,
    Plain,
}

impl Format {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Format::Json,
            "plain" => Format::Plain,
            _ => Format::Table,
        }
    }
}

/// Echo a response body from the API verbatim.
pub fn print_response(body: &str) {
    println!("{body}");
}

pub fn print_output(value: &Value, format: &Format) {
    match format {
        Format::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            );
        }
        Format::Table => print_table(value),
        Format::Plain => print_plain(value),
    }
}

pub fn print_success(msg: &str) {
    eprintln!("{} {}", "OK".green().bold(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "WARN".yellow().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "ERROR".red().bold(), msg);
}

fn print_table(value: &Value) {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                println!("(nothing deployed)");
                return;
            }

            let keys: Vec<String> = match items.first() {
                Some(Value::Object(obj)) => obj.keys().cloned().collect(),
                _ => {
                    for item in items {
                        println!("{}", format_cell(item));
                    }
                    return;
                }
            };

            let mut widths: Vec<usize> = keys.iter().map(|k| k.len()).collect();
            for item in items {
                for (i, key) in keys.iter().enumerate() {
                    let cell = format_cell(item.get(key).unwrap_or(&Value::Null));
                    widths[i] = widths[i].max(cell.len().min(60));
                }
            }

            let header: Vec<String> = keys
                .iter()
                .enumerate()
                .map(|(i, k)| format!("{:width$}", k.to_uppercase(), width = widths[i]))
                .collect();
            println!("{}", header.join("  ").bold());
            let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            println!("{}", sep.join("  ").dimmed());

            for item in items {
                let row: Vec<String> = keys
                    .iter()
                    .enumerate()
                    .map(|(i, key)| {
                        let cell = format_cell(item.get(key).unwrap_or(&Value::Null));
                        format!("{:width$}", truncate(cell, 60), width = widths[i])
                    })
                    .collect();
                println!("{}", row.join("  "));
            }
        }
        Value::Object(obj) => {
            let max_key_len = obj.keys().map(|k| k.len()).max().unwrap_or(0);
            for (key, val) in obj {
                println!(
                    "{:>width$}  {}",
                    key.bold(),
                    truncate(format_cell(val), 80),
                    width = max_key_len
                );
            }
        }
        other => println!("{}", format_cell(other)),
    }
}

fn print_plain(value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                print_plain(item);
            }
        }
        Value::Object(obj) => {
            let line: Vec<String> = obj
                .iter()
                .map(|(key, val)| format!("{}={}", key, format_cell(val)))
                .collect();
            println!("{}", line.join(" "));
        }
        other => println!("{}", format_cell(other)),
    }
}

fn truncate(cell: String, max: usize) -> String {
    if cell.chars().count() > max {
        let head: String = cell.chars().take(max - 3).collect();
        format!("{head}...")
    } else {
        cell
    }
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(a) => format!("[{} items]", a.len()),
        Value::Object(_) => "{...}".to_string(),
    }
}
