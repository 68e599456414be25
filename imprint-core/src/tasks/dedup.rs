use crate::types::ExtractedEntity;
use std::collections::{HashMap, HashSet};

/// Keep-last deduplication of one task's output.
///
/// For every distinct match text only the entry with the largest line index
/// survives; when the text repeats on that same line, the later entry in
/// task order wins. Later occurrences are usually the complete ones (a
/// repeated footer versus an earlier truncated mention).
///
/// The result is ordered by line index and the reduction is idempotent.
pub fn deduplicate(entities: Vec<ExtractedEntity>) -> Vec<ExtractedEntity> {
    let keep = {
        let mut winners: HashMap<&str, (usize, usize)> = HashMap::new();
        for (position, entity) in entities.iter().enumerate() {
            let candidate = (entity.line_index, position);
            winners
                .entry(entity.matched.as_str())
                .and_modify(|winner| {
                    if candidate > *winner {
                        *winner = candidate;
                    }
                })
                .or_insert(candidate);
        }
        let positions: HashSet<usize> = winners.values().map(|(_, position)| *position).collect();
        positions
    };

    let mut kept: Vec<ExtractedEntity> = entities
        .into_iter()
        .enumerate()
        .filter(|(position, _)| keep.contains(position))
        .map(|(_, entity)| entity)
        .collect();
    kept.sort_by_key(|entity| entity.line_index);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(index: usize, text: &str) -> ExtractedEntity {
        ExtractedEntity::new("email", text, index)
    }

    #[test]
    fn test_keeps_largest_index_per_text() {
        let deduped = deduplicate(vec![entity(1, "A"), entity(5, "A"), entity(3, "B")]);
        assert_eq!(deduped, vec![entity(3, "B"), entity(5, "A")]);
    }

    #[test]
    fn test_is_idempotent() {
        let once = deduplicate(vec![
            entity(1, "A"),
            entity(5, "A"),
            entity(3, "B"),
            entity(3, "C"),
            entity(9, "B"),
        ]);
        let twice = deduplicate(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_same_line_repeat_keeps_one() {
        let deduped = deduplicate(vec![entity(2, "A"), entity(2, "A")]);
        assert_eq!(deduped, vec![entity(2, "A")]);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let forward = deduplicate(vec![entity(1, "A"), entity(5, "A"), entity(3, "B")]);
        let reversed = deduplicate(vec![entity(3, "B"), entity(5, "A"), entity(1, "A")]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_empty_input() {
        assert!(deduplicate(Vec::new()).is_empty());
    }
}
