//! Display unit conversion
//!
//! Velocity-bearing controls (the jog slider and its fast/slow memories)
//! hold values in display units. When the display units stop matching the
//! machine units those values are rescaled once by 25.4 or 1/25.4; when
//! they match again the scaling is undone. [`UnitConverter`] is the only
//! code that touches already-scaled values.

use cncconsole_core::LinearUnits;

/// A set of values that follows the display unit factor
pub trait Rescale {
    /// Multiply every tracked value by `factor`
    fn rescale(&mut self, factor: f64);
}

/// Tracks the machine-to-display factor
#[derive(Debug, Clone, PartialEq)]
pub struct UnitConverter {
    factor: f64,
}

impl Default for UnitConverter {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl UnitConverter {
    /// Converter with no scaling applied
    pub fn new() -> Self {
        Self::default()
    }

    /// Current factor: 1.0, 25.4 or 1/25.4
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Bring `target` in line with `machine` units shown in `shown` units.
    ///
    /// Returns whether anything was rescaled. Reporting the same pair twice
    /// is a no-op.
    pub fn update(
        &mut self,
        machine: LinearUnits,
        shown: LinearUnits,
        target: &mut dyn Rescale,
    ) -> bool {
        if machine != shown {
            let wanted = LinearUnits::display_factor(machine, shown);
            if self.factor == wanted {
                return false;
            }
            if self.factor != 1.0 {
                self.normalize(target);
            }
            self.factor = wanted;
            target.rescale(self.factor);
            tracing::info!(
                "Displaying {} machine in {}, factor {:.5}",
                machine,
                shown,
                self.factor
            );
            true
        } else if self.factor != 1.0 {
            self.normalize(target);
            tracing::info!("Displaying in machine units ({})", machine);
            true
        } else {
            false
        }
    }

    // Undo the current scaling in two steps: apply the inverse, then 1.0.
    fn normalize(&mut self, target: &mut dyn Rescale) {
        self.factor = 1.0 / self.factor;
        target.rescale(self.factor);
        self.factor = 1.0;
        target.rescale(self.factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cncconsole_core::MM_PER_INCH;

    #[derive(Debug, Default)]
    struct Recorder {
        value: f64,
        calls: Vec<f64>,
    }

    impl Rescale for Recorder {
        fn rescale(&mut self, factor: f64) {
            self.value *= factor;
            self.calls.push(factor);
        }
    }

    #[test]
    fn test_mismatch_applies_once() {
        let mut units = UnitConverter::new();
        let mut slider = Recorder {
            value: 2540.0,
            ..Default::default()
        };
        assert!(units.update(LinearUnits::Mm, LinearUnits::Inch, &mut slider));
        assert!(!units.update(LinearUnits::Mm, LinearUnits::Inch, &mut slider));
        assert!((slider.value - 100.0).abs() < 1e-9);
        assert_eq!(slider.calls.len(), 1);
        assert!((units.factor() - 1.0 / MM_PER_INCH).abs() < 1e-12);
    }

    #[test]
    fn test_match_reverts_in_two_phases() {
        let mut units = UnitConverter::new();
        let mut slider = Recorder {
            value: 100.0,
            ..Default::default()
        };
        units.update(LinearUnits::Inch, LinearUnits::Mm, &mut slider);
        assert!(units.update(LinearUnits::Inch, LinearUnits::Inch, &mut slider));
        assert_eq!(units.factor(), 1.0);
        assert_eq!(slider.calls, vec![MM_PER_INCH, 1.0 / MM_PER_INCH, 1.0]);
        assert!((slider.value - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_matching_units_leave_values_alone() {
        let mut units = UnitConverter::new();
        let mut slider = Recorder::default();
        assert!(!units.update(LinearUnits::Mm, LinearUnits::Mm, &mut slider));
        assert!(slider.calls.is_empty());
    }
}
