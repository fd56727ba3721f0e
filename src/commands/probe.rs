//! `updater probe`: remote archive size.

use anyhow::{Context, Result};
use updater_core::HttpClient;

use crate::ProcessExit;

pub async fn run_probe_command(client: &HttpClient, url: &str) -> Result<ProcessExit> {
    let size = client
        .probe_size(url)
        .await
        .with_context(|| format!("Failed to probe '{url}'"))?;
    println!("{}", format_size(size));
    Ok(ProcessExit::Success)
}

fn format_size(size: Option<u64>) -> String {
    size.map_or_else(|| "unknown".to_string(), |bytes| bytes.to_string())
}

#[cfg(test)]
mod tests {
    use super::format_size;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(Some(12_345)), "12345");
        assert_eq!(format_size(None), "unknown");
    }
}
