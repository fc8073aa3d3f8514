use anyhow::Result;

use stowage_core::types::{BlobItem, ContainerRef};

use crate::Context;

pub async fn run(ctx: &Context, container: Option<String>, json: bool) -> Result<()> {
    let client = ctx.client()?;
    let container = ContainerRef::new(ctx.container_name(container)?)?;
    let items = client.list_all(&container).await?;

    if json {
        for item in &items {
            println!("{}", serde_json::to_string(item)?);
        }
        return Ok(());
    }

    if items.is_empty() {
        println!("Container {container} is empty.");
        return Ok(());
    }

    println!("{:<60} {:>12} {}", "NAME", "SIZE", "CONTENT TYPE");
    println!("{}", "-".repeat(90));

    for item in &items {
        match item {
            BlobItem::Blob {
                name,
                size,
                content_type,
            } => println!(
                "{:<60} {:>12} {}",
                name,
                format_bytes(*size),
                content_type.as_deref().unwrap_or("-")
            ),
            BlobItem::Directory { prefix } => println!("{:<60} {:>12} {}", prefix, "<DIR>", "-"),
        }
    }

    println!("\n{} items", items.len());
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
