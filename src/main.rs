use anyhow::Context;
use libreria_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load libreria settings")?;
    libreria_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        database = %settings.database.name,
        "libreria-app bootstrap starting"
    );

    libreria_app::bootstrap::serve(&settings, libreria_app::bootstrap::StoreKind::Mongo).await
}
