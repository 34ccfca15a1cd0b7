use std::path::Path;

use anyhow::{bail, Context};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use tracing::{info, warn};

use crate::config::Config;

async fn download_file(url: &str, path: &Path, token: Option<&str>) -> anyhow::Result<()> {
    info!("Downloading {} from {}", path.display(), url);

    let mut header_map = HeaderMap::new();

    if let Some(token) = token {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .context("Invalid GITHUB_TOKEN format")?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .headers(header_map)
        .send()
        .await
        .with_context(|| format!("Failed to send request to {}", url))?;

    if !response.status().is_success() {
        bail!("Failed to download {}: {}", url, response.status());
    }

    let bytes = response.bytes().await.context("Failed to read bytes")?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Fetches every model artifact that is missing on disk and has a download URL configured.
/// Missing artifacts without a URL are left for the model loader to report.
pub async fn ensure_files_exist(config: &Config) -> anyhow::Result<()> {
    info!("Checking model artifacts...");

    let artifacts = [
        (&config.model_path, &config.model_url, "MODEL_URL"),
        (&config.class_list_path, &config.class_list_url, "CLASS_LIST_URL"),
        (&config.suggestions_path, &config.suggestions_url, "SUGGESTIONS_URL"),
    ];

    for (path, url, url_var) in artifacts {
        if tokio::fs::metadata(path).await.is_ok() {
            continue;
        }
        match url {
            Some(url) => download_file(url, path, config.github_token.as_deref()).await?,
            None => warn!("{} is missing and {} is not set", path.display(), url_var),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.model_path = dir.join("model.pb");
        config.class_list_path = dir.join("class_list.txt");
        config.suggestions_path = dir.join("suggestions.json");
        config
    }

    #[tokio::test]
    async fn present_files_are_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        std::fs::write(&config.model_path, b"graph").unwrap();
        std::fs::write(&config.class_list_path, b"Healthy\n").unwrap();
        std::fs::write(&config.suggestions_path, b"{}").unwrap();
        // Unroutable on purpose: any download attempt would fail the test.
        config.model_url = Some("http://127.0.0.1:9/model.pb".into());

        ensure_files_exist(&config).await.unwrap();
        assert_eq!(std::fs::read(&config.model_path).unwrap(), b"graph");
    }

    #[tokio::test]
    async fn missing_files_without_url_are_left_to_the_loader() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        ensure_files_exist(&config).await.unwrap();
        assert!(!config.model_path.exists());
    }

    #[tokio::test]
    async fn failed_download_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.class_list_url = Some("http://127.0.0.1:9/class_list.txt".into());

        assert!(ensure_files_exist(&config).await.is_err());
        assert!(!config.class_list_path.exists());
    }
}
