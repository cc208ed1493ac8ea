//! Linear unit handling
//!
//! Handles the two linear unit systems a machine can report (mm and inch),
//! parsing of jog increment entries with optional unit suffixes and inch
//! fractions, and the number formatting used by the status display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Millimeters per inch
pub const MM_PER_INCH: f64 = 25.4;

/// Linear unit system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinearUnits {
    /// Millimeters
    #[default]
    Mm,
    /// Inches
    Inch,
}

impl LinearUnits {
    /// Interpret the controller's linear units value (machine units per mm).
    ///
    /// A value of 1.0 means mm; 1/25.4 means inch. Anything closer to the
    /// inch value than to 1.0 is taken as inch.
    pub fn from_machine_factor(units_per_mm: f64) -> Self {
        if (units_per_mm - 1.0 / MM_PER_INCH).abs() < (units_per_mm - 1.0).abs() {
            LinearUnits::Inch
        } else {
            LinearUnits::Mm
        }
    }

    /// Unit label ("mm" or "in")
    pub fn label(&self) -> &'static str {
        match self {
            LinearUnits::Mm => "mm",
            LinearUnits::Inch => "in",
        }
    }

    /// Velocity label for per-minute values
    pub fn velocity_label(&self) -> &'static str {
        match self {
            LinearUnits::Mm => "mm/min",
            LinearUnits::Inch => "in/min",
        }
    }

    /// The other unit system
    pub fn toggled(&self) -> Self {
        match self {
            LinearUnits::Mm => LinearUnits::Inch,
            LinearUnits::Inch => LinearUnits::Mm,
        }
    }

    /// Factor that turns a value in machine units into display units.
    ///
    /// 1.0 when both agree, 1/25.4 for an mm machine shown in inch and 25.4
    /// for an inch machine shown in mm.
    pub fn display_factor(machine: LinearUnits, display: LinearUnits) -> f64 {
        match (machine, display) {
            (LinearUnits::Mm, LinearUnits::Inch) => 1.0 / MM_PER_INCH,
            (LinearUnits::Inch, LinearUnits::Mm) => MM_PER_INCH,
            _ => 1.0,
        }
    }

    /// Convert a length in these units into `target` units
    pub fn convert(&self, value: f64, target: LinearUnits) -> f64 {
        value * LinearUnits::display_factor(*self, target)
    }
}

impl fmt::Display for LinearUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinearUnits::Mm => write!(f, "MM"),
            LinearUnits::Inch => write!(f, "IN"),
        }
    }
}

impl FromStr for LinearUnits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mm" | "metric" => Ok(Self::Mm),
            "in" | "inch" | "imperial" => Ok(Self::Inch),
            _ => Err(format!("Unknown linear units: {}", s)),
        }
    }
}

/// Parse a plain decimal, a fraction `a/b`, or a mixed number `1 1/2`
fn parse_number(input: &str) -> Result<f64, String> {
    let mut total = 0.0;
    let mut negative = false;
    let mut seen = false;

    for part in input.split_whitespace() {
        let part = if !seen && part.starts_with('-') {
            negative = true;
            &part[1..]
        } else {
            part
        };
        seen = true;

        if part.contains('/') {
            let frac_parts: Vec<&str> = part.split('/').collect();
            if frac_parts.len() != 2 {
                return Err("Invalid fraction format".to_string());
            }
            let num = frac_parts[0]
                .parse::<f64>()
                .map_err(|_| "Invalid numerator")?;
            let den = frac_parts[1]
                .parse::<f64>()
                .map_err(|_| "Invalid denominator")?;
            if den == 0.0 {
                return Err("Division by zero".to_string());
            }
            total += num / den;
        } else {
            total += part.parse::<f64>().map_err(|e| e.to_string())?;
        }
    }

    if !seen {
        return Err("Empty value".to_string());
    }
    Ok(if negative { -total } else { total })
}

/// Parse one jog increment entry into machine units.
///
/// Entries without a suffix are already in machine units. Recognised
/// suffixes are `mm`, `cm`, `um`, `in`, `inch` and `mil`.
pub fn parse_increment(input: &str, machine: LinearUnits) -> Result<f64, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("Empty increment".to_string());
    }

    let lower = input.to_lowercase();
    let suffixes: [(&str, f64); 6] = [
        ("inch", MM_PER_INCH),
        ("mil", MM_PER_INCH / 1000.0),
        ("mm", 1.0),
        ("cm", 10.0),
        ("um", 0.001),
        ("in", MM_PER_INCH),
    ];

    for (suffix, mm_per_unit) in suffixes {
        if let Some(number) = lower.strip_suffix(suffix) {
            let value_mm = parse_number(number)? * mm_per_unit;
            return Ok(LinearUnits::Mm.convert(value_mm, machine));
        }
    }

    parse_number(&lower)
}

/// Split a configured increment string on commas and/or whitespace.
///
/// Whitespace inside an entry that carries a unit suffix (`1/8 in`) is kept
/// when the list is comma separated.
pub fn split_increments(input: &str) -> Vec<String> {
    let input = input.trim();
    if input.is_empty() {
        return Vec::new();
    }
    if input.contains(',') {
        input
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    } else {
        input.split_whitespace().map(str::to_string).collect()
    }
}

/// Format a surface speed with 0, 1 or 2 decimals depending on magnitude
pub fn format_surface_speed(vc: f64) -> String {
    if vc >= 100.0 {
        format!("{:.0}", vc)
    } else if vc >= 10.0 {
        format!("{:.1}", vc)
    } else {
        format!("{:.2}", vc)
    }
}

/// Format a per-second velocity as a per-minute display value.
///
/// Metric machines show whole units, truncated; inch machines two decimals.
pub fn format_velocity(units_per_second: f64, factor: f64, machine: LinearUnits) -> String {
    let per_minute = units_per_second * 60.0 * factor;
    match machine {
        LinearUnits::Mm => format!("{}", per_minute.trunc() as i64),
        LinearUnits::Inch => format!("{:.2}", per_minute),
    }
}

/// Commanded feed and the feed after override, in machine units.
///
/// `per_rev` selects the finer precision used for feed per revolution (G95).
pub fn format_feed(
    commanded: f64,
    override_factor: f64,
    machine: LinearUnits,
    per_rev: bool,
) -> (String, String) {
    let real = commanded * override_factor;
    match (machine, per_rev) {
        (LinearUnits::Mm, false) => (
            format!("{}", commanded.trunc() as i64),
            format!("{}", real.trunc() as i64),
        ),
        (LinearUnits::Mm, true) => (
            format!("{}", commanded.trunc() as i64),
            format!("{:.2}", real),
        ),
        (LinearUnits::Inch, false) => (format!("{:.3}", commanded), format!("{:.3}", real)),
        (LinearUnits::Inch, true) => (format!("{:.4}", commanded), format!("{:.4}", real)),
    }
}

/// Format a length for display with the precision usual for the unit system
pub fn format_length(value: f64, units: LinearUnits) -> String {
    match units {
        LinearUnits::Mm => format!("{:.3}", value),
        LinearUnits::Inch => format!("{:.4}", value),
    }
}
