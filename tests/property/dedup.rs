//! Record De-duplication Property Tests

use super::generators::{record, start};
use cert_exporter::CertificateRecord;
use cert_exporter::certificates::dedup_by_name;
use chrono::Duration as ChronoDuration;
use proptest::prelude::*;
use std::collections::HashMap;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// De-duplication yields unique names and keeps the last value per name.
    #[test]
    fn prop_dedup_keeps_last_per_name(entries in prop::collection::vec(("[a-c]", 1i64..50), 0..30)) {
        let records: Vec<CertificateRecord> =
            entries.iter().map(|(name, days)| record(name, *days)).collect();

        let mut last: HashMap<&str, i64> = HashMap::new();
        for (name, days) in &entries {
            last.insert(name.as_str(), *days);
        }

        let unique = dedup_by_name(records);
        prop_assert_eq!(unique.len(), last.len());
        for r in &unique {
            let days = last[r.name.as_str()];
            prop_assert_eq!(r.valid_until, start() + ChronoDuration::days(days));
        }
    }
}
