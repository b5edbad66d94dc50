// Copyright 2021 Rigetti Computing
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Single-sideband modulation with mixer predistortion.

use ndarray::{Array1, Zip};

/// Parameters of a single-sideband modulation. Angles are in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Modulation {
    pub frequency: f64,
    pub phase: f64,
    /// Phase offset of the I output, on top of the nominal 90 degrees between I and Q.
    pub phi_skew: f64,
    /// Ratio of the I and Q output amplitudes.
    pub alpha: f64,
    /// The time at which the modulation phase equals `phase`.
    pub phase_reference: f64,
}

impl Default for Modulation {
    fn default() -> Self {
        Self {
            frequency: 0.0,
            phase: 0.0,
            phi_skew: 0.0,
            alpha: 1.0,
            phase_reference: 0.0,
        }
    }
}

/// Modulate an (I, Q) envelope pair:
///
/// ```text
/// [I_mod]   [cos(phi_skew)  sin(phi_skew)] [ cos(wt)  sin(wt)] [I_env]
/// [Q_mod] = [0              1/alpha      ] [-sin(wt)  cos(wt)] [Q_env]
/// ```
///
/// with `wt = 360 * frequency * (t - phase_reference) + phase`. For `alpha < 1` both outputs are
/// further scaled by `alpha`, which keeps every entry of the predistortion matrix at most one.
pub fn apply_modulation(
    i_env: &Array1<f64>,
    q_env: &Array1<f64>,
    tvals: &Array1<f64>,
    modulation: &Modulation,
) -> (Array1<f64>, Array1<f64>) {
    let Modulation {
        frequency,
        phase,
        phi_skew,
        alpha,
        phase_reference,
    } = *modulation;
    let scale = if alpha < 1.0 { alpha } else { 1.0 };
    let phi = tvals.mapv(|t| 360.0 * frequency * (t - phase_reference) + phase);

    let i_mod = Zip::from(i_env)
        .and(q_env)
        .and(&phi)
        .map_collect(|&i, &q, &phi| {
            let phii = (phi + phi_skew).to_radians();
            scale * (i * phii.cos() + q * phii.sin())
        });
    let q_mod = Zip::from(i_env)
        .and(q_env)
        .and(&phi)
        .map_collect(|&i, &q, &phi| {
            let phiq = (phi + 90.0).to_radians();
            scale * (i * phiq.cos() + q * phiq.sin()) / alpha
        });
    (i_mod, q_mod)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    use super::{apply_modulation, Modulation};

    #[test]
    fn unmodulated_envelope_lands_on_i() {
        let envelope = array![0.0, 0.5, 1.0];
        let (i, q) = apply_modulation(
            &envelope,
            &Array1::zeros(3),
            &array![0.0, 1e-9, 2e-9],
            &Modulation::default(),
        );
        assert_relative_eq!(i, envelope, epsilon = 1e-12);
        assert_relative_eq!(q, Array1::<f64>::zeros(3), epsilon = 1e-12);
    }

    #[test]
    fn quadrature_trails_by_a_quarter_period() {
        let modulation = Modulation {
            frequency: 100e6,
            ..Modulation::default()
        };
        let tvals = array![0.0, 2.5e-9];
        let (i, q) = apply_modulation(&Array1::ones(2), &Array1::zeros(2), &tvals, &modulation);
        assert_relative_eq!(i[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(q[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(i[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(q[1], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn small_alpha_bounds_the_predistortion() {
        let modulation = Modulation {
            alpha: 0.5,
            ..Modulation::default()
        };
        let tvals = array![0.0];
        let (i, _) = apply_modulation(&Array1::ones(1), &Array1::zeros(1), &tvals, &modulation);
        assert_relative_eq!(i[0], 0.5, epsilon = 1e-12);
    }
}
