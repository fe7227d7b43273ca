//! Interactive chat REPL.

use std::io::Write;

use packrat_config::PackratConfig;
use packrat_core::memory::UserMemoryFact;
use packrat_engine::EngineBundle;

pub async fn run(
    config: PackratConfig,
    cid: &str,
    uid: &str,
    debug: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bundle = EngineBundle::from_config(&config, uid)?;

    println!("Conversation: {cid}");
    println!("Type /exit to quit.");
    println!("Memory: /memory | /forget <fact_id> | /forget-key <key> | /forget-all\n");

    let stdin = std::io::stdin();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }
        let user_text = line.trim();
        if user_text.is_empty() {
            continue;
        }

        match user_text {
            "/exit" => break,
            "/memory" => {
                let mut facts = bundle.memory_store.get_facts(uid).await?;
                if facts.is_empty() {
                    println!("bot> (memory empty)\n");
                } else {
                    sort_facts(&mut facts);
                    println!("bot> memory:");
                    for f in &facts {
                        println!("  {} | {} = {} (conf={:.2})", f.fact_id, f.key, f.value, f.confidence);
                    }
                    println!();
                }
                continue;
            }
            "/forget-all" => {
                bundle.memory_store.clear(uid).await?;
                println!("bot> memory cleared\n");
                continue;
            }
            _ => {}
        }

        if let Some(key) = user_text.strip_prefix("/forget-key ") {
            let n = bundle.memory_store.delete_by_key(uid, key.trim()).await?;
            println!("bot> forget-key removed: {n}\n");
            continue;
        }
        if let Some(fact_id) = user_text.strip_prefix("/forget ") {
            let ok = bundle.memory_store.delete_fact(uid, fact_id.trim()).await?;
            println!("bot> forget: {}\n", if ok { "ok" } else { "not found" });
            continue;
        }

        match bundle.engine.handle_turn(cid, user_text).await {
            Ok((answer, trace)) => {
                println!("bot> {answer}\n");
                if debug {
                    println!("debug> {}\n", serde_json::to_string_pretty(&trace)?);
                }
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}

pub(crate) fn sort_facts(facts: &mut [UserMemoryFact]) {
    facts.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.updated_at.cmp(&a.updated_at))
    });
}
