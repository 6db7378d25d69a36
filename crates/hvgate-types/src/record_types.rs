//! Well-known record type identifiers.
//!
//! These are the thing-type UUIDs the record service uses for the
//! observations this gateway produces.

use uuid::uuid;

use crate::types::RecordType;

// --- Vital measurements ---

/// Heart rate in beats per minute.
pub const HEART_RATE: RecordType =
    RecordType::from_uuid(uuid!("b81eb4a6-6eac-4292-ae93-3872d6870994"));

/// Blood oxygen saturation (SpO2) as a fraction.
pub const BLOOD_OXYGEN_SATURATION: RecordType =
    RecordType::from_uuid(uuid!("3a54f95f-03d8-4f62-815f-f691fc94a500"));

/// Body weight.
pub const WEIGHT: RecordType =
    RecordType::from_uuid(uuid!("3d34d87e-7fc1-4153-800f-f56592cb0d17"));

/// Generic vital signs (used for body temperature).
pub const VITAL_SIGNS: RecordType =
    RecordType::from_uuid(uuid!("73822612-c15f-4b49-9e65-6af369e55c65"));

/// Blood glucose concentration.
pub const BLOOD_GLUCOSE: RecordType =
    RecordType::from_uuid(uuid!("879e7c04-4e8a-4707-9ad3-b054df467ce4"));

// --- Documents ---

/// Continuity of Care Record.
pub const CCR: RecordType = RecordType::from_uuid(uuid!("1e1ccbfc-a55d-4d91-8940-fa2fbf73c195"));

/// All record types defined in this module.
pub const ALL: [RecordType; 6] = [
    HEART_RATE,
    BLOOD_OXYGEN_SATURATION,
    WEIGHT,
    VITAL_SIGNS,
    BLOOD_GLUCOSE,
    CCR,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_record_types_are_unique() {
        let set: HashSet<_> = ALL.iter().collect();
        assert_eq!(set.len(), ALL.len());
    }

    #[test]
    fn test_record_types_roundtrip_through_text() {
        for rt in ALL {
            let parsed: RecordType = rt.to_string().parse().unwrap();
            assert_eq!(parsed, rt);
        }
    }
}
