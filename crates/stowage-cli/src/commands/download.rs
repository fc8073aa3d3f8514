use anyhow::Result;
use std::path::Path;

use stowage_core::types::ContainerRef;

use crate::Context;

pub async fn run(
    ctx: &Context,
    blob: &str,
    container: Option<String>,
    to: Option<&Path>,
) -> Result<()> {
    let client = ctx.client()?;
    let container = ContainerRef::new(ctx.container_name(container)?)?;
    let blob = container.blob(blob);

    let written = match to {
        Some(dest) => {
            client.download_to(&blob, dest).await?;
            dest.to_path_buf()
        }
        None => client.download(&blob, Path::new(&blob.name)).await?,
    };

    println!("Downloaded {blob} -> {}", written.display());
    Ok(())
}
