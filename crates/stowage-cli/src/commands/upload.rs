use anyhow::{Result, anyhow};
use std::path::Path;

use crate::Context;

pub async fn run(
    ctx: &Context,
    file: &Path,
    container: Option<String>,
    name: Option<String>,
) -> Result<()> {
    let blob_name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("cannot derive a blob name from {}", file.display()))?,
    };

    let client = ctx.client()?;
    let container = client
        .resolve_container(&ctx.container_name(container)?)
        .await?;
    let blob = client.upload(&container, file, &blob_name).await?;

    println!(
        "Uploaded {} -> {blob} ({})",
        file.display(),
        client.account().label()
    );
    Ok(())
}
