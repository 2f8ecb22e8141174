use std::collections::HashMap;

use super::extract::MuseumRecord;

/// Collapse records sharing `(name, city)`, keeping the best (lowest) rank.
///
/// A ranked record displaces an unranked one; otherwise the first one seen
/// stays. Output follows first-seen key order.
pub fn dedup_records(records: Vec<MuseumRecord>) -> Vec<MuseumRecord> {
    let mut index: HashMap<(String, Option<String>), usize> = HashMap::new();
    let mut kept: Vec<MuseumRecord> = Vec::with_capacity(records.len());

    for record in records {
        let key = (record.name.clone(), record.city.clone());
        match index.get(&key) {
            Some(&i) => {
                if outranks(&record, &kept[i]) {
                    kept[i] = record;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(record);
            }
        }
    }

    kept
}

fn outranks(incoming: &MuseumRecord, existing: &MuseumRecord) -> bool {
    match (incoming.rank, existing.rank) {
        (Some(new), Some(old)) => new < old,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Order by rank, unranked last, then by name.
pub fn sort_by_rank(records: &mut [MuseumRecord]) {
    records.sort_by(|a, b| {
        (a.rank.is_none(), a.rank, &a.name).cmp(&(b.rank.is_none(), b.rank, &b.name))
    });
}
