use anyhow::Result;

use stowage_core::config::ConnectionDescriptor;

use crate::Context;

pub fn run(ctx: &Context) -> Result<()> {
    let settings = &ctx.config.stowage;

    println!("Config file:      {}", ctx.config_path.display());
    if !ctx.config_path.exists() {
        println!("                  (not found, using defaults)");
    }

    let connection = ctx
        .connection
        .as_deref()
        .or(settings.connection.as_deref());
    match connection.map(ConnectionDescriptor::parse) {
        Some(Ok(descriptor)) => println!("Connection:       {}", descriptor.label()),
        Some(Err(e)) => println!("Connection:       invalid ({e})"),
        None => println!("Connection:       (none)"),
    }

    println!(
        "Container:        {}",
        settings.container.as_deref().unwrap_or("(none)")
    );
    match settings.max_pages {
        Some(limit) => println!("Max pages:        {limit}"),
        None => println!("Max pages:        unbounded"),
    }
    println!("Local page size:  {}", settings.local_page_size);

    Ok(())
}
