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

//! Calibration-point segments and tomography pulse lists.

use indexmap::IndexMap;
use itertools::Itertools;

use crate::parameter::PulseModifs;
use crate::sequence::{BuildOptions, Segment};
use crate::sweep::SweepPoints;

use super::{
    BlockAlignment, BuilderError, CircuitBuilder, CompositionOptions, InitOptions, InitState,
    QubitSelection, ReadoutOptions,
};

/// Reference states prepared and read out alongside an experiment, one segment per entry of
/// `states`.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationPoints {
    pub qb_names: Vec<String>,
    /// Per segment, one state label per qubit.
    pub states: Vec<Vec<String>>,
    /// The operation prefixes preparing each state label, completed by the qubit name.
    pub pulse_label_map: IndexMap<String, Vec<String>>,
    pub pulse_modifs: PulseModifs,
}

fn default_pulse_label_map() -> IndexMap<String, Vec<String>> {
    [
        ("g", vec!["I "]),
        ("e", vec!["X180 "]),
        ("f", vec!["X180 ", "X180_ef "]),
    ]
    .into_iter()
    .map(|(state, ops)| {
        (
            state.to_owned(),
            ops.into_iter().map(str::to_owned).collect(),
        )
    })
    .collect()
}

impl CalibrationPoints {
    pub fn new(qb_names: Vec<String>, states: Vec<Vec<String>>) -> Self {
        Self {
            qb_names,
            states,
            pulse_label_map: default_pulse_label_map(),
            pulse_modifs: PulseModifs::new(),
        }
    }

    /// Every state label of `states` (e.g. `"ge"`) applied to all qubits at once, or with
    /// `all_combinations` every combination of them, each repeated `n_per_state` times.
    pub fn multi_qubit(
        qb_names: Vec<String>,
        states: &str,
        n_per_state: usize,
        all_combinations: bool,
    ) -> Self {
        let labels: Vec<String> = states.chars().map(String::from).collect();
        let combinations: Vec<Vec<String>> = if all_combinations {
            qb_names
                .iter()
                .map(|_| labels.iter().cloned())
                .multi_cartesian_product()
                .collect()
        } else {
            labels
                .iter()
                .map(|label| vec![label.clone(); qb_names.len()])
                .collect()
        };
        let states = combinations
            .into_iter()
            .flat_map(|states| std::iter::repeat(states).take(n_per_state))
            .collect();
        Self::new(qb_names, states)
    }

    pub fn single_qubit(qb_name: impl Into<String>, states: &str, n_per_state: usize) -> Self {
        Self::multi_qubit(vec![qb_name.into()], states, n_per_state, false)
    }

    fn ops(&self, state: &str, qb_name: &str) -> Result<Vec<String>, BuilderError> {
        let prefixes = self
            .pulse_label_map
            .get(state)
            .ok_or_else(|| BuilderError::UnknownState(state.to_owned()))?;
        Ok(prefixes
            .iter()
            .map(|prefix| format!("{prefix}{qb_name}"))
            .collect())
    }
}

#[derive(Clone, Debug)]
pub struct CalibrationOptions<'a> {
    pub init_state: InitState,
    pub readout: ReadoutOptions,
    /// How the state preparations of the different qubits are aligned.
    pub block_align: BlockAlignment,
    pub segment_prefix: String,
    /// Build at this point of these sweep points.
    pub sweep: Option<(&'a SweepPoints, &'a [usize])>,
    /// The number of readouts expected per calibration state.
    pub df_values_per_point: usize,
}

impl Default for CalibrationOptions<'_> {
    fn default() -> Self {
        Self {
            init_state: InitState::default(),
            readout: ReadoutOptions::default(),
            block_align: BlockAlignment::End,
            segment_prefix: "calibration_".to_owned(),
            sweep: None,
            df_values_per_point: 1,
        }
    }
}

impl CircuitBuilder {
    /// One segment per calibration state (times `df_values_per_point`), each initializing the
    /// qubits, preparing the state and reading out.
    pub fn seg_from_cal_points(
        &self,
        cal_points: &CalibrationPoints,
        options: &CalibrationOptions<'_>,
    ) -> Result<Vec<Segment>, BuilderError> {
        let qubits = QubitSelection::from(cal_points.qb_names.as_slice());
        let mut segments = Vec::new();
        for (i, seg_states) in cal_points.states.iter().enumerate() {
            let qb_blocks = seg_states
                .iter()
                .zip(&cal_points.qb_names)
                .enumerate()
                .map(|(o, (state, qb_name))| {
                    self.block_from_ops(
                        &format!("body_block_{i}_{o}"),
                        &cal_points.ops(state, qb_name)?,
                        None,
                        Some(&cal_points.pulse_modifs),
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;
            let parallel = self.simultaneous_blocks(
                &format!("parallel_qb_blk_{i}"),
                qb_blocks,
                &CompositionOptions {
                    block_align: options.block_align,
                    ..CompositionOptions::default()
                },
            )?;
            let prep = self.initialize(&options.init_state, &qubits, InitOptions::default())?;
            let ro = self.mux_readout(&qubits, &options.readout)?;
            let mut cal_state_block = self.sequential_blocks(
                &format!("cal_states_{i}"),
                [prep, parallel, ro],
                &CompositionOptions::default(),
            )?;

            let states: String = seg_states.concat();
            for j in 0..options.df_values_per_point {
                let build_options = match options.sweep {
                    Some((sweep_points, indices)) => {
                        BuildOptions::default().with_sweep(sweep_points, indices)
                    }
                    None => BuildOptions::default(),
                };
                let index = i * options.df_values_per_point + j;
                segments.push(Segment::new(
                    format!("{}_{index}_{states}", options.segment_prefix),
                    cal_state_block.build(build_options)?,
                )?);
            }
        }
        tracing::debug!(segments = segments.len(), "built calibration segments");
        Ok(segments)
    }

    /// Tomography pulse names for every qubit of the builder: each of `basis_rots` on the
    /// tomography qubits (in logical order), `I` on the others.
    ///
    /// With `all_rots`, every combination of basis rotations over the tomography qubits is
    /// returned; otherwise all tomography qubits get the same rotation.
    pub fn tomography_pulses<S: AsRef<str>>(
        &self,
        tomo_qubits: &QubitSelection,
        basis_rots: &[S],
        all_rots: bool,
    ) -> Result<Vec<Vec<String>>, BuilderError> {
        let all_qubits = self.qb_names();
        let mut indices: Vec<usize> = self
            .get_qubits(tomo_qubits, true)?
            .iter()
            .filter_map(|name| all_qubits.iter().position(|qb| qb == name))
            .collect();
        indices.sort_unstable();

        let basis_rots: Vec<String> = basis_rots
            .iter()
            .map(|rot| rot.as_ref().to_owned())
            .collect();
        let combinations: Vec<Vec<String>> = if all_rots {
            indices
                .iter()
                .map(|_| basis_rots.iter().cloned())
                .multi_cartesian_product()
                .collect()
        } else {
            basis_rots
                .iter()
                .map(|rot| vec![rot.clone(); indices.len()])
                .collect()
        };
        Ok(combinations
            .into_iter()
            .map(|rots| {
                let mut all = vec!["I".to_owned(); all_qubits.len()];
                for (index, rot) in indices.iter().zip(rots) {
                    all[*index] = rot;
                }
                all
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::super::tests::builder;
    use super::{CalibrationOptions, CalibrationPoints};
    use crate::builder::{BuilderError, QubitSelection};

    fn names(qb_names: &[&str]) -> Vec<String> {
        qb_names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[rstest]
    #[case(false, 1, vec![vec!["g", "g"], vec!["e", "e"]])]
    #[case(false, 2, vec![vec!["g", "g"], vec!["g", "g"], vec!["e", "e"], vec!["e", "e"]])]
    #[case(true, 1, vec![vec!["g", "g"], vec!["g", "e"], vec!["e", "g"], vec!["e", "e"]])]
    fn calibration_states(
        #[case] all_combinations: bool,
        #[case] n_per_state: usize,
        #[case] expected: Vec<Vec<&str>>,
    ) {
        let cal_points = CalibrationPoints::multi_qubit(
            names(&["qb1", "qb2"]),
            "ge",
            n_per_state,
            all_combinations,
        );
        let expected: Vec<Vec<String>> = expected.iter().map(|states| names(states)).collect();
        assert_eq!(cal_points.states, expected);
    }

    #[test]
    fn one_segment_per_calibration_state() {
        let cal_points = CalibrationPoints::multi_qubit(names(&["qb1", "qb2"]), "gef", 1, false);
        let options = CalibrationOptions {
            df_values_per_point: 2,
            ..CalibrationOptions::default()
        };
        let segments = builder().seg_from_cal_points(&cal_points, &options).unwrap();
        let segment_names: Vec<_> = segments.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            segment_names,
            vec![
                "calibration__0_gg",
                "calibration__1_gg",
                "calibration__2_ee",
                "calibration__3_ee",
                "calibration__4_ff",
                "calibration__5_ff",
            ]
        );
        let f_pulses: Vec<_> = segments[4]
            .pulses()
            .iter()
            .map(|pulse| pulse.op_code.as_str())
            .filter(|op_code| op_code.starts_with('X'))
            .collect();
        // the end-aligned preparations of both qubits play together
        assert_eq!(f_pulses, vec!["X180 qb1", "X180 qb2", "X180_ef qb1", "X180_ef qb2"]);
    }

    #[test]
    fn unknown_calibration_states_are_rejected() {
        let cal_points = CalibrationPoints::new(names(&["qb1"]), vec![names(&["h"])]);
        assert!(matches!(
            builder().seg_from_cal_points(&cal_points, &CalibrationOptions::default()),
            Err(BuilderError::UnknownState(state)) if state == "h"
        ));
    }

    #[test]
    fn tomography_combines_basis_rotations() {
        let builder = builder();
        let all = builder
            .tomography_pulses(&QubitSelection::All, &["I", "X90", "Y90"], true)
            .unwrap();
        assert_eq!(all.len(), 9);
        assert_eq!(all[1], names(&["I", "X90"]));
        assert_eq!(all[3], names(&["X90", "I"]));

        let diagonal = builder
            .tomography_pulses(&QubitSelection::from("qb2"), &["X90", "Y90"], false)
            .unwrap();
        assert_eq!(diagonal, vec![names(&["I", "X90"]), names(&["I", "Y90"])]);
    }
}
