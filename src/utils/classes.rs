use std::hash::Hash;

/// Invert a map by swapping keys and values
pub fn invert_map<K, V, MK, MV>(original: MK) -> MV
where
    K: Ord + Hash + Eq,
    V: Ord + Hash + Eq + Clone,
    MK: IntoIterator<Item = (K, V)>,
    MV: FromIterator<(V, K)>,
{
    original
        .into_iter()
        .map(|(key, value)| (value, key))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn swaps_keys_and_values() {
        let id2label = BTreeMap::from([(0, "a".to_string()), (1, "b".to_string())]);

        let label2id: BTreeMap<String, usize> = invert_map(id2label);

        assert_eq!(label2id["b"], 1);
        assert_eq!(label2id.len(), 2);
    }
}
