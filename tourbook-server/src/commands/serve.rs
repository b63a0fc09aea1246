use std::path::PathBuf;

use anyhow::{Context, Result};
use tourbook_service::{observability::init_tracing, server::Server};

use super::load_config;
use crate::{app, resources, seed};

pub async fn execute(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    seed_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(port) = port {
        config.service.port = port;
    }
    if seed_dir.is_some() {
        config.store.seed_dir = seed_dir;
    }

    init_tracing(&config)?;

    let store = resources::store();
    if let Some(dir) = &config.store.seed_dir {
        let imported = seed::import_dir(&store, dir)
            .await
            .with_context(|| format!("Failed to seed from {}", dir.display()))?;
        let total: usize = imported.iter().map(|(_, count)| count).sum();
        tracing::info!(
            collections = imported.len(),
            documents = total,
            "Seed data loaded"
        );
    }

    let app = app::router(store, &config);
    Server::new(config).serve(app).await?;
    Ok(())
}
