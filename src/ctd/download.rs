//! Download report files from ctdbase.org into the data directory.

use anyhow::{anyhow, bail, Context};
use futures::StreamExt;
use log::{info, warn};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

fn file_name_from_url(raw_url: &str) -> Result<String, anyhow::Error> {
    let url = url::Url::parse(raw_url).with_context(|| format!("Invalid url: {}", raw_url))?;
    let file_name = url
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow!("The url has no file name: {}", raw_url))?;

    Ok(file_name.to_string())
}

/// Fetch every report file into `data_dir`, returning the local paths in the
/// same order as `urls`. Files already on disk are kept unless `force`.
pub async fn download_reports(
    urls: &[String],
    data_dir: &Path,
    force: bool,
) -> Result<Vec<PathBuf>, anyhow::Error> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("bio2bel_ctd/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut paths = Vec::new();
    for url in urls {
        let file_name = file_name_from_url(url)?;
        let dest = data_dir.join(&file_name);

        if dest.exists() && !force {
            info!(
                "{} is already in {}, skipping the download. Use --force-download to refresh it.",
                file_name,
                data_dir.display()
            );
            paths.push(dest);
            continue;
        }

        if dest.exists() {
            warn!("Re-downloading {}.", file_name);
        }

        download_one(&client, url, &dest).await?;
        paths.push(dest);
    }

    Ok(paths)
}

async fn download_one(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<(), anyhow::Error> {
    info!("Downloading {} to {}...", url, dest.display());

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        bail!("Failed to download {}: HTTP {}", url, response.status());
    }

    // Write to a partial file first so an interrupted download never leaves a
    // truncated report behind to be mistaken for a cached one.
    let part = dest.with_extension("part");
    let mut file = File::create(&part)
        .with_context(|| format!("Failed to create {}", part.display()))?;

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        written += chunk.len() as u64;
    }
    file.flush()?;

    std::fs::rename(&part, dest)?;
    info!("Downloaded {} ({} bytes).", dest.display(), written);

    Ok(())
}
