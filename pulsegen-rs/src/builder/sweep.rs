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

use crate::sequence::{Block, BuildOptions, Segment, Sequence};
use crate::sweep::SweepPoints;

use super::{
    BlockAlignment, BuilderError, CalibrationOptions, CalibrationPoints, CircuitBuilder,
    CompositionOptions, InitOptions, InitState, QubitSelection, ReadoutOptions,
};

/// The sweep parameter whose values are the states to initialize in.
const INITIALIZE: &str = "initialize";
/// The sweep parameter whose values are the states to finalize in.
const FINALIZE: &str = "finalize";
/// The prefix of sweep parameters which set an attribute of the segments.
const SEGMENT_ATTRIBUTE: &str = "Segment.";

/// Generates the body block at a sweep point, given the indices along the first and second
/// dimension.
pub type BodyBlockFn<'a> = dyn Fn(usize, usize, &SweepPoints) -> Result<Block, BuilderError> + 'a;

pub struct SweepOptions<'a> {
    /// The block swept; exactly one of this and `body_block_func` must be given.
    pub body_block: Option<Block>,
    pub body_block_func: Option<&'a BodyBlockFn<'a>>,
    /// Calibration segments appended to every sequence.
    pub cal_points: Option<&'a CalibrationPoints>,
    pub init_state: InitState,
    pub seq_name: String,
    pub readout: ReadoutOptions,
    /// Return the segments instead of sequences.
    pub return_segments: bool,
    /// The qubits initialized and read out.
    pub ro_qubits: QubitSelection,
    /// Record a readout repetition pattern for every readout operation.
    pub repeat_ro: bool,
    pub init_options: InitOptions,
    pub final_options: InitOptions,
    pub block_align_cal_pts: BlockAlignment,
    pub df_values_per_point: usize,
}

impl Default for SweepOptions<'_> {
    fn default() -> Self {
        Self {
            body_block: None,
            body_block_func: None,
            cal_points: None,
            init_state: InitState::default(),
            seq_name: "Sequence".to_owned(),
            readout: ReadoutOptions::default(),
            return_segments: false,
            ro_qubits: QubitSelection::All,
            repeat_ro: true,
            init_options: InitOptions::default(),
            final_options: InitOptions::default(),
            block_align_cal_pts: BlockAlignment::End,
            df_values_per_point: 1,
        }
    }
}

/// The result of [`CircuitBuilder::sweep_n_dim`].
#[derive(Clone, Debug)]
pub enum SweepOutput {
    /// Per point of the second dimension, the segments of the first, with the number of
    /// sweep points along each dimension.
    Segments {
        segments: Vec<Vec<Segment>>,
        n_points: Vec<usize>,
    },
    /// One sequence per point of the second dimension, with the acquisition indices along
    /// each dimension.
    Sequences {
        sequences: Vec<Sequence>,
        acq_indices: Vec<Vec<usize>>,
    },
}

impl CircuitBuilder {
    /// Sweep a body block over one or two dimensions of `sweep_points`.
    ///
    /// Every point of the first dimension becomes a segment of initialization, body,
    /// finalization and readout; every point of the second dimension a sequence of those
    /// segments, followed by calibration segments. Sweep parameters named `initialize` and
    /// `finalize` choose the initial and final states per point, and parameters named
    /// `Segment.<attr>` set the attribute `<attr>` of the segments.
    pub fn sweep_n_dim(
        &self,
        sweep_points: &SweepPoints,
        options: SweepOptions<'_>,
    ) -> Result<SweepOutput, BuilderError> {
        let sweep_dims = sweep_points.len();
        if sweep_dims > 2 {
            return Err(BuilderError::TooManySweepDimensions(sweep_dims));
        }
        if options.body_block.is_some() == options.body_block_func.is_some() {
            return Err(BuilderError::BodyBlock);
        }

        let mut n_points = sweep_points.length();
        let mut sweep_points = sweep_points.clone();
        while n_points.len() < 2 {
            sweep_points.add_sweep_dimension();
            n_points.push(1);
        }

        let ro = self.mux_readout(&options.ro_qubits, &options.readout)?;
        let mut ro_qubits = self.get_qubits(&options.ro_qubits, true)?;
        let mut ro_op_codes: Vec<String> = ro
            .pulses
            .iter()
            .filter_map(|pulse| pulse.op_code().map(str::to_owned))
            .collect();
        if let Some(body_block) = &options.body_block {
            let body_op_codes: Vec<&str> =
                body_block.pulses.iter().filter_map(|p| p.op_code()).collect();
            for qb_name in self.qb_names() {
                let op_code = format!("RO {qb_name}");
                if body_op_codes.contains(&op_code.as_str()) && !ro_qubits.contains(qb_name) {
                    ro_qubits.push(qb_name.clone());
                    ro_op_codes.push(op_code);
                }
            }
        }
        let ro_selection = QubitSelection::Names(ro_qubits);

        let init_dim = sweep_points.find_parameter(INITIALIZE);
        let final_dim = sweep_points.find_parameter(FINALIZE);
        let fixed_prep = match init_dim {
            None => Some(self.initialize(
                &options.init_state,
                &ro_selection,
                options.init_options.clone(),
            )?),
            Some(_) => None,
        };
        let fixed_final = final_dim.is_none().then(|| Block::new("Finalization", Vec::new()));
        let cal_sweep = sweep_points.slice_from(1);

        let mut sequences = Vec::with_capacity(n_points[1]);
        for i in 0..n_points[1] {
            let seq_name = if sweep_dims == 2 {
                format!("{}_{i}", options.seq_name)
            } else {
                options.seq_name.clone()
            };
            let mut sequence = Sequence::new(seq_name);
            for j in 0..n_points[0] {
                let indices = [j, i];
                let prep = match (&fixed_prep, init_dim) {
                    (Some(prep), _) => prep.clone(),
                    (None, dim) => {
                        let state = self.swept_state(&sweep_points, INITIALIZE, dim, &indices)?;
                        self.initialize(&state, &ro_selection, options.init_options.clone())?
                    }
                };
                let body = match (&options.body_block, options.body_block_func) {
                    (Some(body_block), _) => body_block.clone(),
                    (None, Some(body_block_func)) => body_block_func(j, i, &sweep_points)?,
                    (None, None) => return Err(BuilderError::BodyBlock),
                };
                let finalization = match (&fixed_final, final_dim) {
                    (Some(finalization), _) => finalization.clone(),
                    (None, dim) => {
                        let state = self.swept_state(&sweep_points, FINALIZE, dim, &indices)?;
                        self.finalize(&state, &ro_selection, options.final_options.clone())?
                    }
                };

                // each block is built once per segment, so the block names need no counter
                let mut segblock = self.sequential_blocks(
                    "segblock",
                    [prep, body, finalization, ro.clone()],
                    &CompositionOptions {
                        disable_block_counter: true,
                        ..CompositionOptions::default()
                    },
                )?;
                let skip_sweep = options.body_block.is_none() && self.fast_mode();
                let build_options = if skip_sweep {
                    BuildOptions::default()
                } else {
                    BuildOptions::default().with_sweep(&sweep_points, &indices)
                };
                let mut segment = Segment::new(format!("seg{j}"), segblock.build(build_options)?)?;
                for dim in 0..2 {
                    for param in sweep_points.parameters(dim) {
                        let Some(attribute) = param.strip_prefix(SEGMENT_ATTRIBUTE) else {
                            continue;
                        };
                        if let Some(value) = sweep_points.value(param, &indices) {
                            segment.set_attribute(attribute, value.clone());
                        }
                    }
                }
                sequence.add(segment)?;
            }
            if let Some(cal_points) = options.cal_points {
                let cal_indices = [i];
                let cal_options = CalibrationOptions {
                    init_state: options.init_state.clone(),
                    readout: options.readout.clone(),
                    block_align: options.block_align_cal_pts,
                    sweep: Some((&cal_sweep, &cal_indices)),
                    df_values_per_point: options.df_values_per_point,
                    ..CalibrationOptions::default()
                };
                sequence.extend(self.seg_from_cal_points(cal_points, &cal_options)?)?;
            }
            tracing::debug!(
                sequence = %sequence.name,
                segments = sequence.len(),
                "built sweep sequence"
            );
            sequences.push(sequence);
        }

        if options.return_segments {
            let segments = sequences
                .into_iter()
                .map(|sequence| sequence.segments().cloned().collect())
                .collect();
            n_points.truncate(sweep_dims.max(1));
            return Ok(SweepOutput::Segments { segments, n_points });
        }

        if options.repeat_ro {
            for sequence in &mut sequences {
                for op_code in &ro_op_codes {
                    sequence.repeat_ro(op_code, &self.operation_dict)?;
                }
            }
        }
        let n_acq = sequences.first().map_or(0, Sequence::n_acq_elements);
        let mut acq_indices = vec![(0..n_acq).collect()];
        if sweep_dims == 2 {
            acq_indices.push((0..n_points[1]).collect());
        }
        Ok(SweepOutput::Sequences {
            sequences,
            acq_indices,
        })
    }

    fn swept_state(
        &self,
        sweep_points: &SweepPoints,
        param: &str,
        dimension: Option<usize>,
        indices: &[usize; 2],
    ) -> Result<InitState, BuilderError> {
        let value = dimension
            .and_then(|dim| sweep_points.values(dim, param)?.get(indices[dim]))
            .ok_or_else(|| crate::parameter::ParameterError::Missing(param.to_owned()))?;
        Ok(InitState::from_param(value)?)
    }
}
