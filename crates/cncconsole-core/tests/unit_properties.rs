use cncconsole_core::units::{parse_increment, LinearUnits};
use proptest::prelude::*;

proptest! {
    #[test]
    fn converting_there_and_back_is_identity(value in -10_000.0f64..10_000.0) {
        let inch = LinearUnits::Mm.convert(value, LinearUnits::Inch);
        let back = LinearUnits::Inch.convert(inch, LinearUnits::Mm);
        prop_assert!((back - value).abs() < 1e-9);
    }

    #[test]
    fn unsuffixed_increments_are_machine_units(value in 0.0001f64..100.0) {
        let text = format!("{:.4}", value);
        let expected: f64 = text.parse().unwrap();
        for units in [LinearUnits::Mm, LinearUnits::Inch] {
            let parsed = parse_increment(&text, units).unwrap();
            prop_assert!((parsed - expected).abs() < 1e-12);
        }
    }
}
