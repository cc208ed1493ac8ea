use cncconsole_control::{JogController, UnitConverter};
use cncconsole_core::LinearUnits;
use cncconsole_settings::ConsoleConfig;
use proptest::prelude::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

proptest! {
    #[test]
    fn switching_display_units_and_back_restores_the_slider(
        velocity in 100.0f64..3000.0,
        slow in any::<bool>(),
        inch_machine in any::<bool>(),
    ) {
        let (machine, other) = if inch_machine {
            (LinearUnits::Inch, LinearUnits::Mm)
        } else {
            (LinearUnits::Mm, LinearUnits::Inch)
        };
        let mut jog = JogController::new(&ConsoleConfig::default());
        jog.set_velocity(velocity);
        jog.set_slow(slow);
        let slider = jog.slider();
        let memories = jog.memories();

        let mut units = UnitConverter::new();
        prop_assert!(units.update(machine, other, &mut jog));
        prop_assert!(!units.update(machine, other, &mut jog));
        prop_assert!(units.update(machine, machine, &mut jog));
        prop_assert_eq!(units.factor(), 1.0);

        let after = jog.slider();
        prop_assert!(close(after.value, slider.value));
        prop_assert!(close(after.min, slider.min));
        prop_assert!(close(after.max, slider.max));
        prop_assert!(close(jog.memories().0, memories.0));
        prop_assert!(close(jog.memories().1, memories.1));
    }

    #[test]
    fn jog_velocity_is_independent_of_display_units(velocity in 100.0f64..3000.0) {
        let mut jog = JogController::new(&ConsoleConfig::default());
        jog.set_velocity(velocity);
        let machine_units = jog.velocity(1.0).unwrap();

        let mut units = UnitConverter::new();
        units.update(LinearUnits::Mm, LinearUnits::Inch, &mut jog);
        let displayed = jog.velocity(units.factor()).unwrap();
        prop_assert!(close(displayed, machine_units));
    }
}
