use crate::console::ConsoleChat;
use chrono::Utc;
use clap::Args;
use rollbot_core::{RollConfig, SqliteChangeFeed, SqliteEventStore, Storage};
use rollbot_lottery::{AdminGate, Dispatched, Dispatcher, RollEngine};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct RunArgs {
    /// Keep running after stdin closes, until Ctrl-C
    #[arg(long)]
    pub linger: bool,
}

pub async fn handle_run_command(
    args: RunArgs,
    config: RollConfig,
    storage: Arc<Storage>,
) -> anyhow::Result<()> {
    config.validate()?;

    let store = Arc::new(SqliteEventStore::new(storage.clone()));
    let chat = Arc::new(ConsoleChat::new());
    let engine = Arc::new(RollEngine::new(store, chat.clone(), config.clone()));

    let resumed = engine.resume(Utc::now()).await?;
    println!(
        "Resumed {} pending lotteries across {} groups",
        resumed,
        config.groups.len()
    );

    let shutdown = CancellationToken::new();
    let feed = Arc::new(SqliteChangeFeed::new(storage, config.bridge.poll_interval));
    let bridge = engine.spawn_bridge(feed, shutdown.clone());

    let dispatcher = Dispatcher::new(
        engine.clone(),
        chat.clone(),
        Box::new(AdminGate::new(config.admins.iter().copied())),
    );

    println!(
        "Reading messages from stdin: <group> <user_id> <name> [@<id>]... [^<reply_id>] <text>"
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match chat.parse_line(&line) {
            Ok(message) => {
                if let Dispatched::Ignored = dispatcher.handle(&message).await {
                    tracing::debug!("Ignored message #{}", message.message_id);
                }
            }
            Err(e) => eprintln!("Unreadable line: {:#}", e),
        }
    }

    if args.linger {
        println!(
            "stdin closed, {} lotteries still armed; press Ctrl-C to stop",
            engine.scheduler().armed_count()
        );
        tokio::signal::ctrl_c().await?;
    }

    shutdown.cancel();
    bridge.await?;
    Ok(())
}
