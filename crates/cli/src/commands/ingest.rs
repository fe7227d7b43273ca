//! Document ingestion command.

use std::path::PathBuf;

use packrat_config::PackratConfig;
use packrat_engine::EngineBundle;

pub async fn run(
    config: PackratConfig,
    paths: &[PathBuf],
    replace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bundle = EngineBundle::from_config(&config, "default")?;

    if replace {
        for path in paths {
            let removed = bundle
                .rag_store
                .delete_by_source(&path.display().to_string())
                .await?;
            if removed > 0 {
                println!("Replaced {removed} chunks from {}", path.display());
            }
        }
    }

    let ingested = bundle.indexer.ingest_paths(paths).await?;
    let store_size = bundle.rag_store.count().await?;
    println!("Ingested chunks: {ingested}. Store size: {store_size}");
    Ok(())
}
