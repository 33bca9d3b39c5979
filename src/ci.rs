use crate::error::{DeployError, Result};
use std::io::Write;
use std::path::Path;
use tracing::debug;

const OUTPUT_FILE_ENV: &str = "GITHUB_OUTPUT";

/// Publish a step output for later pipeline steps. Outside a runner
/// (`GITHUB_OUTPUT` unset) this is a no-op.
pub fn set_output(name: &str, value: &str) -> Result<()> {
    match std::env::var_os(OUTPUT_FILE_ENV) {
        Some(path) => append_output(Path::new(&path), name, value),
        None => {
            debug!("{} not set, skipping output {}", OUTPUT_FILE_ENV, name);
            Ok(())
        }
    }
}

fn append_output(path: &Path, name: &str, value: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DeployError::fs(path, e))?;
    writeln!(file, "{name}={value}").map_err(|e| DeployError::fs(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_output_keeps_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        std::fs::write(&path, "other=1\n").unwrap();

        append_output(&path, "transformPath", "/work/dist_transformed").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "other=1\ntransformPath=/work/dist_transformed\n");
    }
}
