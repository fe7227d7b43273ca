//! Memory inspection and pruning commands.

use packrat_config::PackratConfig;
use packrat_engine::EngineBundle;

use crate::MemoryAction;
use super::chat::sort_facts;

pub async fn run(
    config: PackratConfig,
    action: MemoryAction,
    uid: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let bundle = EngineBundle::from_config(&config, uid)?;

    match action {
        MemoryAction::List => {
            let mut facts = bundle.memory_store.get_facts(uid).await?;
            if facts.is_empty() {
                println!("(memory empty)");
                return Ok(());
            }
            sort_facts(&mut facts);
            for f in &facts {
                println!("{} | {} = {} (conf={:.2})", f.fact_id, f.key, f.value, f.confidence);
            }
        }
        MemoryAction::Forget { fact_id } => {
            let ok = bundle.memory_store.delete_fact(uid, &fact_id).await?;
            println!("{}", if ok { "forgotten" } else { "not found" });
        }
        MemoryAction::ForgetKey { key } => {
            let n = bundle.memory_store.delete_by_key(uid, &key).await?;
            println!("removed {n} facts");
        }
        MemoryAction::Clear => {
            bundle.memory_store.clear(uid).await?;
            println!("memory cleared");
        }
    }

    Ok(())
}
