//! Turn scheduling: the speaking order for one round.

use rand::Rng;
use rand::seq::SliceRandom;

/// One slot in a round's speaking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// Index into the session's registered agent list.
    Agent(usize),
    /// The single human slot, present at most once per round.
    Human,
}

/// Produce the speaking order for one round.
///
/// Without a human participant, the order is a fresh uniform permutation of
/// all agents; nothing prevents the same order recurring across rounds.
/// With a human participant, agents keep their registration order and the
/// human slot is inserted at a uniform position in `[0, agent_count]`.
pub fn round_order(
    agent_count: usize,
    human_participant: bool,
    rng: &mut impl Rng,
) -> Vec<Speaker> {
    let mut order: Vec<Speaker> = (0..agent_count).map(Speaker::Agent).collect();

    if human_participant {
        let slot = rng.gen_range(0..=agent_count);
        order.insert(slot, Speaker::Human);
    } else {
        order.shuffle(rng);
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_order_without_human_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let order = round_order(4, false, &mut rng);
            assert_eq!(order.len(), 4);
            let mut seen: Vec<usize> = order
                .iter()
                .map(|s| match s {
                    Speaker::Agent(i) => *i,
                    Speaker::Human => panic!("no human slot expected"),
                })
                .collect();
            seen.sort_unstable();
            assert_eq!(seen, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_order_with_human_keeps_registration_order() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let order = round_order(4, true, &mut rng);
            assert_eq!(order.len(), 5);
            let humans = order.iter().filter(|s| **s == Speaker::Human).count();
            assert_eq!(humans, 1);
            let agents: Vec<usize> = order
                .iter()
                .filter_map(|s| match s {
                    Speaker::Agent(i) => Some(*i),
                    Speaker::Human => None,
                })
                .collect();
            assert_eq!(agents, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_human_slot_covers_full_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut positions = std::collections::HashSet::new();
        for _ in 0..500 {
            let order = round_order(3, true, &mut rng);
            let pos = order
                .iter()
                .position(|s| *s == Speaker::Human)
                .expect("human slot present");
            positions.insert(pos);
        }
        // All of [0, 3] should show up over enough draws.
        assert_eq!(positions.len(), 4);
    }

    #[test]
    fn test_single_agent_orders() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(round_order(1, false, &mut rng), vec![Speaker::Agent(0)]);
        let with_human = round_order(1, true, &mut rng);
        assert_eq!(with_human.len(), 2);
    }
}
