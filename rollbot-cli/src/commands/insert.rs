use chrono::Utc;
use clap::Args;
use rollbot_core::storage::RollStore;
use rollbot_core::{Participant, RollEvent, Source, Storage};
use rollbot_lottery::request::parse_draw_time;

/// Insert a lottery the way a web front-end would. A running bot announces
/// and schedules it.
#[derive(Args)]
pub struct InsertArgs {
    /// Group to hold the lottery in
    #[arg(short, long)]
    pub group: i64,
    /// Prize description
    #[arg(short, long)]
    pub prize: String,
    /// Draw time, "now" or "YYYY-MM-DD HH:MM" local time
    #[arg(short, long, default_value = "now")]
    pub at: String,
    /// Number of winners
    #[arg(short, long, default_value_t = 1)]
    pub winners: u32,
    /// Organizer account id
    #[arg(long, default_value_t = 0)]
    pub organizer_id: i64,
    /// Organizer display name
    #[arg(long, default_value = "web")]
    pub organizer: String,
}

pub async fn handle_insert_command(args: InsertArgs, storage: &Storage) -> anyhow::Result<()> {
    let draw_time = parse_draw_time(args.at.trim(), Utc::now())?;
    let organizer = Participant::new(args.organizer_id, args.organizer);

    let mut event = RollEvent::new(args.group, &organizer, args.prize, draw_time, Source::Web);
    event.winner_count = args.winners;
    RollStore::new(storage).insert_event(&event).await?;

    println!("Lottery inserted!");
    println!("  ID: {}", event.id);
    println!("  Cancel with: /cancel #{}", event.short_id());
    println!("  Group: {}", event.group_id);
    println!("  Prize: {}", event.prize);
    println!(
        "  Draw time: {}",
        event.draw_time.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
    );
    println!("  Winners: {}", event.effective_winner_count());
    Ok(())
}
