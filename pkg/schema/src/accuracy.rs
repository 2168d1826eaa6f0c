use crate::types::Accuracy;

/// Derives the accuracy-bucket term suffix for a numeric value at a given
/// bucket resolution (spec.md §4.F "Accuracy levels" — "each indexed value
/// also emits a term at each accuracy level").
pub fn numeric_bucket(value: i64, accuracy: Accuracy) -> i64 {
    let divisor = match accuracy {
        Accuracy::Tens => 10,
        Accuracy::Hundreds => 100,
        Accuracy::Thousands => 1000,
        _ => 1,
    };
    value.div_euclid(divisor) * divisor
}

/// Derives the accuracy-bucket term suffix for a Unix timestamp (seconds)
/// at a given temporal resolution. Buckets are computed as a truncated
/// epoch-seconds value for the coarser unit, so two timestamps in the same
/// bucket produce identical terms.
pub fn date_bucket(epoch_seconds: i64, accuracy: Accuracy) -> i64 {
    const HOUR: i64 = 3600;
    const DAY: i64 = 86_400;
    const YEAR: i64 = 365 * DAY;
    match accuracy {
        Accuracy::Hour => epoch_seconds.div_euclid(HOUR) * HOUR,
        Accuracy::Day => epoch_seconds.div_euclid(DAY) * DAY,
        Accuracy::Month => epoch_seconds.div_euclid(30 * DAY) * (30 * DAY),
        Accuracy::Year => epoch_seconds.div_euclid(YEAR) * YEAR,
        Accuracy::Decade => epoch_seconds.div_euclid(10 * YEAR) * (10 * YEAR),
        Accuracy::Century => epoch_seconds.div_euclid(100 * YEAR) * (100 * YEAR),
        Accuracy::Millennium => epoch_seconds.div_euclid(1000 * YEAR) * (1000 * YEAR),
        _ => epoch_seconds,
    }
}

/// One term per configured accuracy level for `prefix`, used both to index
/// a value and, for range queries, to decide which accuracy level to query
/// against (spec.md §4.F "range queries expand to unions over accuracy
/// terms").
pub fn accuracy_terms(prefix: &str, value: i64, levels: &[Accuracy], is_temporal: bool) -> Vec<String> {
    levels
        .iter()
        .map(|&level| {
            let bucket = if is_temporal { date_bucket(value, level) } else { numeric_bucket(value, level) };
            format!("{prefix}:{}:{bucket}", level.suffix())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_buckets_group_nearby_values() {
        assert_eq!(numeric_bucket(123, Accuracy::Tens), numeric_bucket(129, Accuracy::Tens));
        assert_ne!(numeric_bucket(123, Accuracy::Tens), numeric_bucket(131, Accuracy::Tens));
    }

    #[test]
    fn date_buckets_group_same_day() {
        let morning = 1_700_000_000i64;
        let evening = morning + 3600 * 5;
        assert_eq!(date_bucket(morning, Accuracy::Day), date_bucket(evening, Accuracy::Day));
        assert_ne!(date_bucket(morning, Accuracy::Hour), date_bucket(evening, Accuracy::Hour));
    }

    #[test]
    fn terms_are_prefixed_per_level() {
        let terms = accuracy_terms("D00aabbcc", 1_700_000_000, &[Accuracy::Day, Accuracy::Year], true);
        assert_eq!(terms.len(), 2);
        assert!(terms[0].starts_with("D00aabbcc:d:"));
        assert!(terms[1].starts_with("D00aabbcc:y:"));
    }
}
