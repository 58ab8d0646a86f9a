use proptest::prelude::*;

use checkin::core::{AttendeeRecord, FieldConfig, parse_registration_number};
use checkin::storage::migrations::apply_migrations;
use checkin::storage::{AttendeeStore, Database};

fn memory_store() -> AttendeeStore {
    let mut db = Database::open_in_memory().unwrap();
    apply_migrations(db.conn_mut()).unwrap();
    AttendeeStore::new(db.into_shared(), FieldConfig::default())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn allocated_numbers_increase(seed in 0u64..5000, count in 1usize..15) {
        let store = memory_store();
        store
            .add_attendee(
                "e1",
                AttendeeRecord {
                    registration_number: format!("REG{seed:06}"),
                    name: "Seed".to_string(),
                    email: "seed@example.com".to_string(),
                    ..AttendeeRecord::default()
                },
            )
            .unwrap();

        let mut previous = seed;
        for i in 0..count {
            let stored = store
                .add_attendee(
                    "e1",
                    AttendeeRecord {
                        name: format!("Guest {i}"),
                        email: format!("guest{i}@example.com"),
                        ..AttendeeRecord::default()
                    },
                )
                .unwrap();
            let number = parse_registration_number(&stored.registration_number).unwrap();
            prop_assert!(number > previous);
            previous = number;
        }
    }
}
