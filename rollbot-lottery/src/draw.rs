use rand::Rng;
use rollbot_core::{Participant, ParticipantSet};

/// Pick up to `winner_count` distinct winners from `snapshot`.
///
/// A count of zero means one. When the pool cannot be narrowed
/// (`winner_count >= snapshot.len()`) everybody wins. Otherwise winners are
/// sampled uniformly without replacement, in the order they were drawn.
pub fn draw<R: Rng + ?Sized>(
    snapshot: &[Participant],
    winner_count: u32,
    rng: &mut R,
) -> Vec<Participant> {
    if snapshot.is_empty() {
        return Vec::new();
    }

    let quota = winner_count.max(1) as usize;
    if quota >= snapshot.len() {
        return snapshot.to_vec();
    }

    let pool: ParticipantSet = snapshot.iter().cloned().collect();
    let mut winners = Vec::with_capacity(quota);
    while winners.len() < quota {
        let candidates = pool.snapshot();
        let picked = &candidates[rng.gen_range(0..candidates.len())];
        if let Some(winner) = pool.remove(picked.user_id) {
            winners.push(winner);
        }
    }
    winners
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn people(n: i64) -> Vec<Participant> {
        (1..=n)
            .map(|i| Participant::new(i, format!("user-{}", i)))
            .collect()
    }

    #[test]
    fn test_empty_snapshot_draws_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(draw(&[], 3, &mut rng).is_empty());
        assert!(draw(&[], 0, &mut rng).is_empty());
    }

    #[test]
    fn test_zero_means_one() {
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(draw(&people(5), 0, &mut rng).len(), 1);
    }

    #[test]
    fn test_cardinality_and_uniqueness() {
        let mut rng = StdRng::seed_from_u64(3);
        let pool = people(8);
        for k in 0..12u32 {
            let winners = draw(&pool, k, &mut rng);
            let expected = (k.max(1) as usize).min(pool.len());
            assert_eq!(winners.len(), expected, "k = {}", k);

            let ids: HashSet<i64> = winners.iter().map(|w| w.user_id).collect();
            assert_eq!(ids.len(), winners.len());
            assert!(winners.iter().all(|w| pool.contains(w)));
        }
    }

    #[test]
    fn test_everyone_wins_at_threshold() {
        let mut rng = StdRng::seed_from_u64(4);
        let pool = people(3);
        for k in [3u32, 4, 100] {
            let winners: HashSet<i64> = draw(&pool, k, &mut rng)
                .iter()
                .map(|w| w.user_id)
                .collect();
            assert_eq!(winners, pool.iter().map(|p| p.user_id).collect());
        }
    }

    #[test]
    fn test_every_participant_can_win() {
        let mut rng = StdRng::seed_from_u64(5);
        let pool = people(4);
        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.insert(draw(&pool, 1, &mut rng)[0].user_id);
        }
        assert_eq!(seen.len(), 4);
    }
}
