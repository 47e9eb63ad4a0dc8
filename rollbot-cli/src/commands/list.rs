use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use rollbot_core::storage::RollStore;
use rollbot_core::Storage;

#[derive(Args)]
pub struct ListArgs {
    /// Group whose lotteries to show
    pub group: i64,
    /// Print the records as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn handle_list_command(args: ListArgs, storage: &Storage) -> anyhow::Result<()> {
    let events = RollStore::new(storage).list_events(args.group).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("No lotteries in group {}.", args.group);
        println!("Create one with: rollbot insert --group {} --prize <prize>", args.group);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "ID", "Prize", "Draw time", "Source", "Status", "Joined", "Winners",
    ]);

    for event in &events {
        let winners = event
            .winners
            .iter()
            .map(|w| w.display_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            format!("#{}", event.short_id()),
            event.prize.clone(),
            event
                .draw_time
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            event.source.as_str().to_string(),
            event.status.as_str().to_string(),
            event.participants.size().to_string(),
            winners,
        ]);
    }

    println!("{}", table);
    Ok(())
}
