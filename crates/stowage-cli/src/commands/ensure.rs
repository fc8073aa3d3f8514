use anyhow::Result;

use crate::Context;

pub async fn run(ctx: &Context, container: &str) -> Result<()> {
    let client = ctx.client()?;
    let resolved = client.resolve_container(container).await?;
    println!(
        "Container ready: {resolved} on {} (public access: blob)",
        client.account().label()
    );
    Ok(())
}
