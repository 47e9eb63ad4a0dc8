//! Parsing of `/roll` and `/cancel` command bodies.

use crate::{LotteryError, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use rollbot_core::{Participant, ShortId};

pub const ROLL_COMMAND: &str = "/roll";
pub const CANCEL_COMMAND: &str = "/cancel";

const DRAW_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A parsed `/roll` body, ready to become an event.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub winner_count: u32,
    pub prize: String,
    pub draw_time: DateTime<Utc>,
    pub seeds: Vec<Participant>,
}

/// Leading command word of a message, if it looks like one.
pub fn command_of(text: &str) -> Option<&str> {
    let word = text.split_whitespace().next()?;
    word.starts_with('/').then_some(word)
}

/// Parse a `/roll` message:
///
/// ```text
/// /roll [winner count]
/// <prize>
/// now | YYYY-MM-DD HH:MM
/// [participant name]...
/// ```
///
/// Names after the draw time are seeded with the synthetic id `-(line index)`.
pub fn parse_roll(text: &str, now: DateTime<Utc>) -> Result<CreateRequest> {
    let lines: Vec<&str> = text.lines().collect();

    let header = lines.first().map(|l| l.trim()).unwrap_or_default();
    let mut words = header.split_whitespace();
    if words.next() != Some(ROLL_COMMAND) {
        return Err(LotteryError::invalid_command(format!(
            "expected {} on the first line",
            ROLL_COMMAND
        )));
    }
    let winner_count = match words.next() {
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            LotteryError::invalid_command(format!("winner count '{}' is not a number", raw))
        })?,
        None => 1,
    };

    let prize = lines.get(1).map(|l| l.trim()).unwrap_or_default();
    if prize.is_empty() {
        return Err(LotteryError::invalid_command("missing prize"));
    }

    let raw_time = lines.get(2).map(|l| l.trim()).unwrap_or_default();
    let draw_time = parse_draw_time(raw_time, now)?;

    let mut seeds = Vec::new();
    for (index, line) in lines.iter().enumerate().skip(3) {
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        tracing::debug!("Seeding participant {:?} from line {}", name, index);
        seeds.push(Participant::new(-(index as i64), name));
    }

    Ok(CreateRequest {
        winner_count,
        prize: prize.to_string(),
        draw_time,
        seeds,
    })
}

/// `now` or a local wall-clock time.
pub fn parse_draw_time(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if raw.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    let naive = NaiveDateTime::parse_from_str(raw, DRAW_TIME_FORMAT).map_err(|e| {
        tracing::warn!("Failed to parse draw time {:?}: {}", raw, e);
        LotteryError::InvalidDrawTime(raw.to_string())
    })?;

    // Skipped local times (DST gaps) are rejected, folds take the earlier one
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| LotteryError::InvalidDrawTime(raw.to_string()))
}

/// Parse `/cancel #abc123`.
pub fn parse_cancel(text: &str) -> Result<ShortId> {
    let mut words = text.split_whitespace();
    if words.next() != Some(CANCEL_COMMAND) {
        return Err(LotteryError::invalid_command(format!(
            "expected {}",
            CANCEL_COMMAND
        )));
    }
    let raw = words
        .next()
        .ok_or_else(|| LotteryError::invalid_command("missing lottery id"))?;
    raw.parse::<ShortId>().map_err(LotteryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_parse_roll_now_with_seeds() {
        let now = Utc::now();
        let request = parse_roll("/roll\nAWP | Asiimov\nnow\nalice\n\nbob", now).unwrap();

        assert_eq!(request.winner_count, 1);
        assert_eq!(request.prize, "AWP | Asiimov");
        assert_eq!(request.draw_time, now);
        assert_eq!(
            request.seeds,
            vec![Participant::new(-3, "alice"), Participant::new(-5, "bob")]
        );
    }

    #[test]
    fn test_parse_roll_winner_count_and_local_time() {
        let now = Utc::now();
        let request = parse_roll("/roll 3\nknife\n2031-05-04 20:30", now).unwrap();

        assert_eq!(request.winner_count, 3);
        let expected = Local
            .with_ymd_and_hms(2031, 5, 4, 20, 30, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(request.draw_time, expected);
        assert!(request.draw_time > now + Duration::days(365));
        assert!(request.seeds.is_empty());
    }

    #[test]
    fn test_malformed_draw_time_is_rejected() {
        let err = parse_roll("/roll\nknife\ntomorrow-ish", Utc::now()).unwrap_err();
        assert!(matches!(err, LotteryError::InvalidDrawTime(raw) if raw == "tomorrow-ish"));

        let err = parse_roll("/roll\nknife", Utc::now()).unwrap_err();
        assert!(matches!(err, LotteryError::InvalidDrawTime(_)));
    }

    #[test]
    fn test_malformed_roll_bodies() {
        assert!(matches!(
            parse_roll("/roll", Utc::now()),
            Err(LotteryError::InvalidCommand(_))
        ));
        assert!(matches!(
            parse_roll("/roll many\nknife\nnow", Utc::now()),
            Err(LotteryError::InvalidCommand(_))
        ));
        assert!(matches!(
            parse_roll("hello\nknife\nnow", Utc::now()),
            Err(LotteryError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_parse_cancel() {
        assert_eq!(parse_cancel("/cancel #ABC123").unwrap().as_str(), "abc123");
        assert_eq!(parse_cancel("/cancel abc123").unwrap().as_str(), "abc123");
        assert!(parse_cancel("/cancel").is_err());
        assert!(parse_cancel("/cancel #xyz").is_err());
    }

    #[test]
    fn test_command_of() {
        assert_eq!(command_of("/roll 2\nprize"), Some("/roll"));
        assert_eq!(command_of("  /cancel #abc123"), Some("/cancel"));
        assert_eq!(command_of("hello"), None);
        assert_eq!(command_of(""), None);
    }
}
