//! MongoDB connection bootstrap.

use anyhow::Context;
use libreria_kernel::settings::DatabaseSettings;
use mongodb::{bson::doc, Client, Database};

/// Build a client from the configured connection string and select the
/// configured database.
///
/// The driver connects lazily; call [`ping`] to surface an unreachable
/// server at startup instead of on the first request.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Database> {
    let client = Client::with_uri_str(&settings.uri)
        .await
        .with_context(|| "failed to parse MongoDB connection string")?;

    tracing::info!(
        target: "libreria-db",
        database = %settings.name,
        collection = %settings.collection,
        "mongodb client created"
    );

    Ok(client.database(&settings.name))
}

/// Round-trip a `ping` command to the server.
pub async fn ping(database: &Database) -> mongodb::error::Result<()> {
    database.run_command(doc! { "ping": 1 }).await?;
    Ok(())
}
