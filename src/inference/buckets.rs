//! Elapsed-time buckets and the ordered table of per-bucket models.

use chrono::NaiveDateTime;

/// Bucket of an elapsed time: whole `width`-minute steps, capped at `max`
///
/// `None` when the arrival lies after `now`.
#[must_use]
pub fn bucket_for(
    arrival: NaiveDateTime,
    now: NaiveDateTime,
    width: u32,
    max: u32,
) -> Option<u32> {
    if now < arrival {
        return None;
    }
    let minutes = (now - arrival).num_minutes();
    let width = i64::from(width.max(1));
    let bucket = (minutes / width) * width;
    Some(u32::try_from(bucket).map_or(max, |b| b.min(max)))
}

/// Models ordered by the lower bound of the bucket they score
#[derive(Debug, Clone)]
pub struct BucketTable<M> {
    entries: Vec<(u32, M)>,
}

impl<M> BucketTable<M> {
    /// Build a table; entries are sorted by bound
    #[must_use]
    pub fn new(mut entries: Vec<(u32, M)>) -> Self {
        entries.sort_by_key(|(bound, _)| *bound);
        Self { entries }
    }

    /// Model of the last entry whose bound is at or below `bucket`
    #[must_use]
    pub fn select(&self, bucket: u32) -> Option<&M> {
        let position = self.entries.partition_point(|(bound, _)| *bound <= bucket);
        position
            .checked_sub(1)
            .map(|index| &self.entries[index].1)
    }

    /// Bucket bounds in order
    pub fn bounds(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|(bound, _)| *bound)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(minutes: i64) -> (NaiveDateTime, NaiveDateTime) {
        let arrival = chrono::NaiveDate::from_ymd_opt(2024, 2, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap();
        (arrival, arrival + Duration::minutes(minutes))
    }

    #[test]
    fn test_bucket_rounds_down_and_caps() {
        let (arrival, now) = at(8);
        assert_eq!(bucket_for(arrival, now, 10, 180), Some(0));
        let (arrival, now) = at(22);
        assert_eq!(bucket_for(arrival, now, 10, 180), Some(20));
        let (arrival, now) = at(600);
        assert_eq!(bucket_for(arrival, now, 10, 180), Some(180));
        let (arrival, now) = at(-5);
        assert_eq!(bucket_for(arrival, now, 10, 180), None);
    }

    #[test]
    fn test_select_uses_last_lower_bound() {
        let table = BucketTable::new(vec![(20, "b"), (0, "a"), (60, "c")]);
        assert_eq!(table.select(0), Some(&"a"));
        assert_eq!(table.select(30), Some(&"b"));
        assert_eq!(table.select(180), Some(&"c"));
        assert_eq!(table.bounds().collect::<Vec<_>>(), vec![0, 20, 60]);

        let sparse = BucketTable::new(vec![(30, "late")]);
        assert_eq!(sparse.select(10), None);
    }
}
