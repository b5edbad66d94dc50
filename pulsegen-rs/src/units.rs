//! Angle units and the modular arithmetic used on rotation angles.

/// An angle in degrees. Operation codes, phases and skews are all expressed in degrees.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Degrees<T>(pub T);

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Radians<T>(pub T);

impl From<Degrees<f64>> for Radians<f64> {
    fn from(degrees: Degrees<f64>) -> Self {
        Radians(degrees.0.to_radians())
    }
}

impl From<Radians<f64>> for Degrees<f64> {
    fn from(radians: Radians<f64>) -> Self {
        Degrees(radians.0.to_degrees())
    }
}

/// Modulo whose result takes the sign of the divisor (floored division), as opposed to `%`
/// whose result takes the sign of the dividend.
#[inline]
pub fn floor_mod(value: f64, divisor: f64) -> f64 {
    value - divisor * (value / divisor).floor()
}

/// Map a rotation angle onto `(-180, 180]`, expressed as a fraction of a 180 degree rotation.
///
/// This is the argument handed to a qubit's amplitude non-linearity correction: a rotation
/// of 270 degrees is played as a rotation of -90 degrees, i.e. `-0.5`.
#[inline]
pub fn rotation_fraction(angle: Degrees<f64>) -> f64 {
    (floor_mod(angle.0 + 180.0, -360.0) + 180.0) / 180.0
}

#[cfg(test)]
mod tests {
    use super::{floor_mod, rotation_fraction, Degrees};
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(7.0, 3.0, 1.0)]
    #[case(-7.0, 3.0, 2.0)]
    #[case(7.0, -3.0, -2.0)]
    #[case(360.0, -360.0, 0.0)]
    fn floor_mod_takes_sign_of_divisor(
        #[case] value: f64,
        #[case] divisor: f64,
        #[case] expected: f64,
    ) {
        assert_relative_eq!(floor_mod(value, divisor), expected);
    }

    #[rstest]
    #[case(180.0, 1.0)]
    #[case(90.0, 0.5)]
    #[case(-90.0, -0.5)]
    #[case(270.0, -0.5)]
    #[case(-180.0, 1.0)]
    #[case(0.0, 0.0)]
    #[case(540.0, 1.0)]
    fn rotation_fraction_wraps_into_half_open_interval(#[case] angle: f64, #[case] expected: f64) {
        assert_relative_eq!(rotation_fraction(Degrees(angle)), expected, epsilon = 1e-12);
    }
}
