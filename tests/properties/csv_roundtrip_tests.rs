use proptest::prelude::*;

use checkin::core::{AttendeeRecord, Field, FieldConfig, generate_csv, parse_csv};

// Values may carry commas, quotes and line breaks; the codec has to quote
// them on the way out and unquote them on the way back. Empty values are
// allowed so that whole rows can be blank.
const TEXT: &str = "[a-zA-Z0-9 ,\"\n가-힣]{0,16}";

fn arb_record() -> impl Strategy<Value = AttendeeRecord> {
    (
        "(REG[0-9]{6})?",
        TEXT,
        TEXT,
        "[0-9\\-]{0,13}",
        "([a-z]{1,8}@[a-z]{1,8}\\.com)?",
        prop_oneof![Just("초대".to_string()), Just("현장방문".to_string()), Just(String::new())],
        any::<bool>(),
        proptest::option::of("2025-0[1-9]-[12][0-9] [01][0-9]:[0-5][0-9]:[0-5][0-9]"),
    )
        .prop_map(
            |(registration_number, name, company, contact, email, invitation_type, checked_in, checkin_time)| {
                AttendeeRecord {
                    registration_number,
                    name,
                    company,
                    contact,
                    email,
                    invitation_type,
                    checked_in,
                    checkin_time,
                }
            },
        )
}

/// A non-empty column set in arbitrary order.
fn arb_fields() -> impl Strategy<Value = Vec<Field>> {
    prop::sample::subsequence(Field::ALL.to_vec(), 1..=Field::ALL.len()).prop_shuffle()
}

/// Keep only the columns a CSV with `fields` can carry.
fn project(record: &AttendeeRecord, fields: &[Field]) -> AttendeeRecord {
    let mut out = AttendeeRecord::default();
    for field in fields {
        out.set_value(*field, &record.value(*field));
    }
    out
}

proptest! {
    #[test]
    fn csv_round_trip_preserves_rows(rows in prop::collection::vec(arb_record(), 0..12)) {
        let config = FieldConfig::default();
        let encoded = generate_csv(config.csv_fields(), &rows).unwrap();
        let decoded = parse_csv(&encoded, &config).unwrap();
        prop_assert_eq!(decoded, rows);
    }

    #[test]
    fn round_trip_over_any_column_subset(
        fields in arb_fields(),
        rows in prop::collection::vec(arb_record(), 0..8),
        blanks in 0usize..3,
    ) {
        let mut rows: Vec<AttendeeRecord> = rows.iter().map(|row| project(row, &fields)).collect();
        rows.extend(std::iter::repeat_with(AttendeeRecord::default).take(blanks));

        let config = FieldConfig::new(fields.clone(), Vec::new()).unwrap();
        let encoded = generate_csv(config.csv_fields(), &rows).unwrap();
        let decoded = parse_csv(&encoded, &config).unwrap();
        prop_assert_eq!(decoded, rows);
    }

    #[test]
    fn header_order_does_not_matter(rows in prop::collection::vec(arb_record(), 1..6)) {
        let mut reversed = Field::ALL.to_vec();
        reversed.reverse();
        let encoded = generate_csv(&reversed, &rows).unwrap();
        let decoded = parse_csv(&encoded, &FieldConfig::default()).unwrap();
        prop_assert_eq!(decoded, rows);
    }
}
