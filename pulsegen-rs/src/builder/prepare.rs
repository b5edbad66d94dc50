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

use indexmap::IndexMap;

use crate::parameter::{ParamValue, ParametricValue, PulseParams};
use crate::sequence::Block;

use super::{BuilderError, CircuitBuilder, PrepParams, PreparationType, QubitSelection};

/// The operations bringing a qubit from a classified state back to the ground state.
fn reset_ops(state: &str) -> Option<&'static [&'static str]> {
    let ops: &'static [&'static str] = match state {
        "g" => &["I"],
        "e" => &["X180"],
        "f" => &["X180_ef", "X180"],
        _ => return None,
    };
    Some(ops)
}

fn default_threshold_mapping() -> IndexMap<i64, String> {
    IndexMap::from([(0, "g".to_owned()), (1, "e".to_owned())])
}

/// The length of a reset pulse: its `pulse_length`, or its Gaussian truncation width.
fn reset_pulse_length(pulse: &PulseParams) -> Result<f64, BuilderError> {
    match pulse.opt_f64("pulse_length")? {
        Some(length) => Ok(length),
        None => Ok(pulse.f64("sigma")? * pulse.f64("nr_sigma")?),
    }
}

impl CircuitBuilder {
    /// The preparation preceding an experiment on `qubits`, placed before `ref_pulse`.
    ///
    /// Preselection reads out every qubit once, `ro_separation` before the experiment. Active
    /// reset repeats a readout of every qubit followed by feed-forward reset pulses, one set
    /// per readout outcome, selected by codeword; the repetitions are spaced by
    /// `ro_separation` and end at `ref_pulse`.
    pub fn prepare(
        &self,
        qubits: &QubitSelection,
        ref_pulse: &str,
        prep_params: &PrepParams,
        block_name: Option<&str>,
    ) -> Result<Block, BuilderError> {
        let block_name = block_name.map_or_else(
            || format!("Preparation_{}", super::assemble::selection_label(qubits)),
            str::to_owned,
        );
        let qb_names = self.get_qubits(qubits, true)?;
        let pulses = match prep_params.preparation_type {
            PreparationType::Wait => {
                tracing::debug!(block = %block_name, "no preparation");
                Vec::new()
            }
            _ if qb_names.is_empty() => {
                tracing::warn!(block = %block_name, "preparation of no qubits is empty");
                Vec::new()
            }
            PreparationType::Preselection => self.preselection(&qb_names, ref_pulse, prep_params)?,
            PreparationType::ActiveResetE | PreparationType::ActiveResetEf => {
                self.active_reset(&qb_names, ref_pulse, prep_params)?
            }
        };
        Ok(Block::new(block_name, pulses))
    }

    fn readout_pulse(&self, qb_name: &str) -> Result<PulseParams, BuilderError> {
        match self.get_pulses(&format!("RO {qb_name}")) {
            Ok(mut pulses) if pulses.len() == 1 => Ok(pulses.remove(0)),
            Ok(_) | Err(BuilderError::OperationNotFound(_)) => {
                Err(BuilderError::ReadoutNotFound(qb_name.to_owned()))
            }
            Err(error) => Err(error),
        }
    }

    fn preselection(
        &self,
        qb_names: &[String],
        ref_pulse: &str,
        prep_params: &PrepParams,
    ) -> Result<Vec<PulseParams>, BuilderError> {
        let mut pulses = Vec::with_capacity(qb_names.len() + 1);
        for qb_name in qb_names {
            let mut pulse = self.readout_pulse(qb_name)?;
            pulse
                .set("ref_point", "start")
                .set("element_name", "preselection_element");
            if let Some(sweep_params) = self.prep_sweep_params.get(qb_name) {
                for (field, param) in sweep_params {
                    if pulse.contains_key(field) {
                        pulse.set(field.as_str(), ParametricValue::new(param.as_str()));
                    }
                }
            }
            pulses.push(pulse);
        }
        if let Some(first) = pulses.first_mut() {
            first
                .set("ref_pulse", ref_pulse)
                .set("name", "preselection_RO")
                .set("pulse_delay", -prep_params.ro_separation);
        }
        let mut end = PulseParams::new();
        end.set("name", "end")
            .set("pulse_type", "VirtualPulse")
            .set("pulse_length", 0.0)
            .set("ref_pulse", "preselection_RO")
            .set("pulse_delay", prep_params.ro_separation)
            .set("ref_point", "start");
        pulses.push(end);
        Ok(pulses)
    }

    /// Per qubit, the reset operations and their codeword for every readout outcome.
    fn reset_codewords(
        &self,
        qb_name: &str,
        prep_params: &PrepParams,
    ) -> Result<Vec<(&'static [&'static str], i64)>, BuilderError> {
        let mapping = prep_params
            .threshold_mapping
            .get(qb_name)
            .cloned()
            .unwrap_or_else(default_threshold_mapping);
        let n_outcomes = match prep_params.preparation_type {
            PreparationType::ActiveResetEf => {
                if mapping.len() != 4 {
                    return Err(BuilderError::ThresholdMapping {
                        qubit: qb_name.to_owned(),
                        expected: 4,
                        found: mapping.len(),
                    });
                }
                4
            }
            _ => 2,
        };
        (0..n_outcomes)
            .map(|codeword| {
                let state = mapping.get(&codeword).ok_or_else(|| BuilderError::ThresholdMapping {
                    qubit: qb_name.to_owned(),
                    expected: n_outcomes as usize,
                    found: mapping.len(),
                })?;
                let ops =
                    reset_ops(state).ok_or_else(|| BuilderError::UnknownState(state.clone()))?;
                Ok((ops, codeword))
            })
            .collect()
    }

    fn active_reset(
        &self,
        qb_names: &[String],
        ref_pulse: &str,
        prep_params: &PrepParams,
    ) -> Result<Vec<PulseParams>, BuilderError> {
        let mut readouts = Vec::with_capacity(qb_names.len());
        for (i, qb_name) in qb_names.iter().enumerate() {
            let mut pulse = self.readout_pulse(qb_name)?;
            pulse.set("ref_point", if i == 0 { "end" } else { "start" });
            readouts.push(pulse);
        }

        let mut resets = Vec::new();
        for qb_name in qb_names {
            for (ops, codeword) in self.reset_codewords(qb_name, prep_params)? {
                // reset waveforms are shared by every reset of a codeword, so they carry no
                // phase relative to the start of the experiment
                let mut delay = prep_params.post_ro_wait;
                for op in ops {
                    for mut pulse in self.get_pulses(&format!("{op} {qb_name}"))? {
                        pulse
                            .set("phaselock", false)
                            .set("codeword", codeword)
                            .set("ref_point", "start")
                            .set("pulse_delay", delay);
                        delay += reset_pulse_length(&pulse)?;
                        resets.push(pulse);
                    }
                }
            }
        }

        let mut pulses = Vec::new();
        for rep in 0..prep_params.reset_reps {
            let reference = format!("refpulse_reset_element_{rep}");
            let mut ro_list = readouts.clone();
            for pulse in &mut ro_list {
                pulse.set("element_name", format!("reset_ro_element_{rep}"));
            }
            if let Some(first) = ro_list.first_mut() {
                first.set("name", reference.as_str());
                if rep == 0 {
                    first.set("ref_pulse", ref_pulse).set(
                        "pulse_delay",
                        -(prep_params.reset_reps as f64) * prep_params.ro_separation,
                    );
                } else {
                    first
                        .set("ref_pulse", format!("refpulse_reset_element_{}", rep - 1))
                        .set("pulse_delay", prep_params.ro_separation)
                        .set("ref_point", "start");
                }
            }
            pulses.extend(ro_list);
            pulses.extend(resets.iter().map(|reset| {
                let mut reset = reset.clone();
                reset
                    .set("element_name", format!("reset_pulse_element_{rep}"))
                    .set("ref_pulse", reference.as_str());
                reset
            }));
        }

        if prep_params.pad_end && prep_params.reset_reps > 0 {
            let mut end = PulseParams::new();
            end.set("name", "end")
                .set("pulse_type", "VirtualPulse")
                .set("pulse_length", 0.0)
                .set(
                    "ref_pulse",
                    format!("refpulse_reset_element_{}", prep_params.reset_reps - 1),
                )
                .set("pulse_delay", prep_params.ro_separation)
                .set("ref_point", "start");
            pulses.push(end);
        }
        tracing::debug!(
            qubits = qb_names.len(),
            reset_reps = prep_params.reset_reps,
            pulses = pulses.len(),
            "built active reset"
        );
        Ok(pulses)
    }
}
