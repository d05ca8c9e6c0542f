//! Latest-record selection.

use std::collections::BTreeMap;

use companion_core::NormalizedTimestamp;

/// Keeps the most recent item per entity.
///
/// Items without an entity id are skipped. On equal timestamps the item that
/// came first in input order wins, so the same input always yields the same
/// selection. Invalid timestamps rank below every valid one.
pub fn latest_per_entity<T, K, I, E, S>(items: I, entity_of: E, timestamp_of: S) -> BTreeMap<K, T>
where
    K: Ord,
    I: IntoIterator<Item = T>,
    E: Fn(&T) -> Option<K>,
    S: Fn(&T) -> NormalizedTimestamp,
{
    let mut latest: BTreeMap<K, (NormalizedTimestamp, T)> = BTreeMap::new();
    for item in items {
        let Some(entity) = entity_of(&item) else {
            continue;
        };
        let timestamp = timestamp_of(&item);
        match latest.get(&entity) {
            Some((current, _)) if *current >= timestamp => {}
            _ => {
                latest.insert(entity, (timestamp, item));
            }
        }
    }

    latest
        .into_iter()
        .map(|(entity, (_, item))| (entity, item))
        .collect()
}

/// Returns the most recent item accepted by `matches`, first in input order
/// on ties.
pub fn latest_matching<'a, T, M, S>(items: &'a [T], matches: M, timestamp_of: S) -> Option<&'a T>
where
    M: Fn(&T) -> bool,
    S: Fn(&T) -> NormalizedTimestamp,
{
    let mut best: Option<(NormalizedTimestamp, &'a T)> = None;
    for item in items.iter().filter(|item| matches(*item)) {
        let timestamp = timestamp_of(item);
        if best.is_none_or(|(current, _)| timestamp > current) {
            best = Some((timestamp, item));
        }
    }
    best.map(|(_, item)| item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn invalid_timestamp_only_wins_alone() {
        let items = [
            ("a", NormalizedTimestamp::Invalid),
            ("a", NormalizedTimestamp::from(datetime!(2024-01-01 00:00 UTC))),
            ("b", NormalizedTimestamp::Invalid),
        ];
        let latest = latest_per_entity(items, |item| Some(item.0), |item| item.1);
        assert!(latest["a"].1.is_valid());
        assert_eq!(latest["b"].1, NormalizedTimestamp::Invalid);
    }
}
