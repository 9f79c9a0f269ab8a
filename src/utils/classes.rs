use std::hash::Hash;

/// Invert a map by swapping keys and values
pub fn invert_map<K, V, MK, MV>(original: MK) -> MV
where
    K: Hash + Eq,
    V: Hash + Eq + Clone,
    MK: IntoIterator<Item = (K, V)>,
    MV: FromIterator<(V, K)>,
{
    original
        .into_iter()
        .map(|(key, value)| (value, key))
        .collect()
}

/// Index of the largest value, with ties going to the lowest index
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, value)| match best {
            Some((_, best_value)) if best_value >= value => best,
            _ => Some((i, value)),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_invert_map() {
        let id2label = vec![(0, "O".to_string()), (1, "B-PER".to_string())];

        let label2id: HashMap<String, usize> = invert_map(id2label);

        assert_eq!(label2id["B-PER"], 1);
        assert_eq!(label2id["O"], 0);
    }

    #[test]
    fn test_argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(argmax(&[]), None);
    }
}
