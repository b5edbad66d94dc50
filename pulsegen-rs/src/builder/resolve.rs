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

use crate::parameter::{
    ParamValue, ParameterError, ParametricOutput, ParametricValue, PulseParams,
};
use crate::parser::{Angle, GateFamily, OpCode};
use crate::units::{rotation_fraction, Degrees};

use super::{BuilderError, CircuitBuilder, QubitSelection};

/// The calibrated rotation angle every single-qubit drive operation is stored for.
const CALIBRATED_ANGLE: f64 = 180.0;

impl CircuitBuilder {
    /// The name of the CZ operation between two qubits present in the operation dictionary,
    /// trying both qubit orders. Without a `cz_pulse_name` the builder's default is used.
    pub fn get_cz_operation_name(
        &self,
        qb1: &str,
        qb2: &str,
        cz_pulse_name: Option<&str>,
    ) -> Result<String, BuilderError> {
        let cz_pulse_name = cz_pulse_name.unwrap_or(&self.cz_pulse_name);
        let (qb1, qb2) = if self.fast_mode() {
            (qb1.to_owned(), qb2.to_owned())
        } else {
            let resolved = self.get_qubits(&QubitSelection::from([qb1, qb2]), true)?;
            (resolved[0].clone(), resolved[1].clone())
        };
        [format!("{cz_pulse_name} {qb1} {qb2}"), format!("{cz_pulse_name} {qb2} {qb1}")]
            .into_iter()
            .find(|op_code| self.operation_dict.contains(op_code))
            .ok_or_else(|| BuilderError::CzNotFound {
                gate: cz_pulse_name.to_owned(),
                qb1,
                qb2,
            })
    }

    /// As [`CircuitBuilder::get_cz_operation_name`], with the gate type and qubits taken
    /// from an op code such as `CZ qb1 qb2` or `CZ_nztc qb2 qb1`.
    pub fn get_cz_operation_name_from_op_code(&self, op_code: &str) -> Result<String, BuilderError> {
        let words: Vec<&str> = op_code.split_whitespace().collect();
        match words.as_slice() {
            [gate, qb1, qb2] => {
                let cz_pulse_name = (*gate != "CZ").then_some(*gate);
                self.get_cz_operation_name(qb1, qb2, cz_pulse_name)
            }
            _ => Err(BuilderError::OperandCount {
                op_code: op_code.to_owned(),
                expected: 2,
                found: words.len().saturating_sub(1),
            }),
        }
    }

    fn copy_op(&self, op_code: &str) -> Result<PulseParams, BuilderError> {
        self.operation_dict
            .copy_op(op_code)
            .ok_or_else(|| BuilderError::OperationNotFound(op_code.to_owned()))
    }

    /// Resolve an operation into pulse-parameter records.
    ///
    /// An operation is either a key of the operation dictionary or an op code such as
    /// `X90 qb1`, `mZ:theta 0` or `CZ_nztc45 qb2 qb1` (see [`OpCode`]). Arbitrary angles of
    /// drive operations rescale the amplitude of the calibrated 180 degree pulse, Z rotations
    /// become virtual `basis_rotation`s, and controlled phase gates get their `cphase` set or,
    /// where the configuration asks for it, are decomposed into two calibrated CZ gates and
    /// single-qubit gates. A parametric angle produces [`ParametricValue`]s which are
    /// resolved when the block is built at a sweep point.
    pub fn get_pulses(&self, op: &str) -> Result<Vec<PulseParams>, BuilderError> {
        let mut words = op.split_whitespace();
        let Some(op_name) = words.next() else {
            return Err(BuilderError::OperationNotFound(op.to_owned()));
        };
        let operands: Vec<String> = words.map(str::to_owned).collect();
        let operands = if self.fast_mode() || operands.is_empty() {
            operands
        } else {
            self.get_qubits(&QubitSelection::Names(operands), false)?
        };
        let (simultaneous, op_name) = OpCode::strip_simultaneity(op_name);
        let canonical = std::iter::once(op_name)
            .chain(operands.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        let literal = self.operation_dict.copy_op(op).or_else(|| {
            [OpCode::without_simultaneity(op), canonical.clone()]
                .into_iter()
                .find_map(|key| self.operation_dict.copy_op(&key))
        });
        let mut pulses = match literal {
            Some(pulse) => vec![pulse],
            None => {
                let op_code: OpCode = canonical.parse()?;
                match op_code.family() {
                    GateFamily::ControlledPhase => self.controlled_phase(&op_code)?,
                    GateFamily::VirtualZ | GateFamily::Drive => {
                        vec![self.single_qubit_rotation(&op_code, &canonical)?]
                    }
                    GateFamily::Unsupported => {
                        return Err(BuilderError::OperationNotFound(op.to_owned()))
                    }
                }
            }
        };
        if let [pulse] = pulses.as_mut_slice() {
            pulse.set("op_code", op);
        }
        if simultaneous {
            if let Some(first) = pulses.first_mut() {
                first.set("ref_point", "start");
            }
        }
        tracing::debug!(op, pulses = pulses.len(), "resolved operation");
        Ok(pulses)
    }

    /// As [`CircuitBuilder::get_pulses`], for operations which resolve to exactly one pulse.
    pub fn get_pulse(&self, op: &str) -> Result<PulseParams, BuilderError> {
        let mut pulses = self.get_pulses(op)?;
        match pulses.len() {
            1 => Ok(pulses.remove(0)),
            _ => Err(BuilderError::MultiplePulses(op.to_owned())),
        }
    }

    /// Virtual Z rotations by `theta` degrees on each of the selected qubits.
    pub fn z_gate(
        &self,
        theta: f64,
        qubits: &QubitSelection,
    ) -> Result<Vec<PulseParams>, BuilderError> {
        let mut pulses = Vec::new();
        for qb_name in self.get_qubits(qubits, true)? {
            pulses.extend(self.get_pulses(&format!("Z{theta} {qb_name}"))?);
        }
        Ok(pulses)
    }

    /// The signed rotation angle of an op code: a number, or a parametric value when the angle
    /// refers to a sweep parameter.
    fn signed_angle(op_code: &OpCode, angle: &Angle) -> ParamValue {
        let parametric = match angle {
            Angle::Value(value) => return ParamValue::Number(op_code.sign() * value),
            Angle::Parameter(parameter) => ParametricValue::new(parameter.clone()),
            Angle::Expression {
                parameter,
                expression,
            } => ParametricValue::new(parameter.clone()).with_expression(expression.clone()),
        };
        let provenance = std::iter::once(op_code.name())
            .chain(op_code.operands.iter().cloned())
            .collect();
        ParamValue::from(
            parametric
                .with_sign(op_code.sign())
                .with_op_code(provenance),
        )
    }

    fn single_qubit_rotation(
        &self,
        op_code: &OpCode,
        canonical: &str,
    ) -> Result<PulseParams, BuilderError> {
        if self
            .config
            .decompose_rotation_gates
            .get(&op_code.gate)
            .map_or(false, |policy| policy.is_enabled())
        {
            return Err(BuilderError::SingleQubitDecomposition(canonical.to_owned()));
        }
        let qb_name = match op_code.operands.as_slice() {
            [qb_name] => qb_name,
            operands => {
                return Err(BuilderError::OperandCount {
                    op_code: canonical.to_owned(),
                    expected: 1,
                    found: operands.len(),
                })
            }
        };
        let device_op = format!("{}{CALIBRATED_ANGLE} {qb_name}", op_code.gate);
        let mut pulse = self
            .operation_dict
            .copy_op(&device_op)
            .ok_or_else(|| BuilderError::OperationNotFound(canonical.to_owned()))?;
        let angle = op_code
            .angle
            .clone()
            .unwrap_or(Angle::Value(CALIBRATED_ANGLE));
        let rotation = Self::signed_angle(op_code, &angle);

        if op_code.family() == GateFamily::VirtualZ {
            let mut basis_rotation = IndexMap::new();
            basis_rotation.insert(qb_name.clone(), rotation);
            pulse.set("basis_rotation", basis_rotation);
            return Ok(pulse);
        }
        let amplitude = pulse.f64("amplitude")?;
        let correction = self.qubits.nonlinearity_correction(qb_name);
        match rotation {
            ParamValue::Parametric(parametric) => {
                let output = ParametricOutput::DriveAmplitude {
                    amplitude,
                    correction,
                };
                pulse.set("amplitude", (*parametric).with_output(output));
            }
            rotation => {
                let angle = rotation.as_f64().unwrap_or(CALIBRATED_ANGLE);
                let fraction = rotation_fraction(Degrees(angle));
                pulse.set("amplitude", amplitude * correction.apply(fraction));
            }
        }
        Ok(pulse)
    }

    fn controlled_phase(&self, op_code: &OpCode) -> Result<Vec<PulseParams>, BuilderError> {
        let qubits: [String; 2] = match op_code.operands.as_slice() {
            [qb1, qb2] => [qb1.clone(), qb2.clone()],
            operands => {
                return Err(BuilderError::OperandCount {
                    op_code: op_code.to_string(),
                    expected: 2,
                    found: operands.len(),
                })
            }
        };
        let cphase = op_code
            .angle
            .as_ref()
            .map(|angle| Self::signed_angle(op_code, angle));
        let cz_pulse_name = (op_code.gate != "CZ").then_some(op_code.gate.as_str());
        let device_op = self.get_cz_operation_name(&qubits[0], &qubits[1], cz_pulse_name)?;
        let gate_type = device_op.split_whitespace().next().unwrap_or_default();
        let decomposition_qubits = self
            .config
            .decompose_rotation_gates
            .get(gate_type)
            .and_then(|policy| policy.decomposition_qubits(&qubits));

        let (mut cphase, [qb_a, qb_b]) = match (cphase, decomposition_qubits) {
            (Some(cphase), Some(decomposition_qubits)) => (cphase, decomposition_qubits),
            (cphase, _) => {
                let mut pulse = self.copy_op(&device_op)?;
                if let Some(cphase) = cphase {
                    pulse.set("cphase", cphase);
                }
                return Ok(vec![pulse]);
            }
        };
        if let ParamValue::Parametric(parametric) = &mut cphase {
            if let Some(name) = parametric.op_code.first_mut() {
                *name = "Z".to_owned();
            }
        }
        tracing::debug!(%device_op, %qb_a, %qb_b, "decomposing controlled phase gate");
        // With CZ(x) = diag(1, 1, 1, exp(-ix)) and each Hadamard replaced by Y90 Z180:
        // CZ(x) ~ Z_a(-x/2) Z_b(-x/2) H_a CZ H_a Z_a(x/2) H_a CZ H_a
        let decomposed = [
            format!("Y90 {qb_a}"),
            device_op.clone(),
            format!("Z180 {qb_a}"),
            format!("Y90 {qb_a}"),
            format!("Z0 {qb_a}"),
            format!("Z180 {qb_a}"),
            format!("Y90 {qb_a}"),
            device_op,
            format!("Z180 {qb_a}"),
            format!("Y90 {qb_a}"),
            format!("Z0 {qb_a}"),
            format!("Z0 {qb_b}"),
        ];
        let mut pulses = decomposed
            .iter()
            .map(|op_code| {
                let mut pulse = self.copy_op(op_code)?;
                pulse.set("op_code", op_code.as_str());
                Ok(pulse)
            })
            .collect::<Result<Vec<_>, BuilderError>>()?;
        let rotations = [
            (4, &qb_a, 0.5, 0.0),
            (10, &qb_a, -0.5, 180.0),
            (11, &qb_b, -0.5, 0.0),
        ];
        for (index, qb_name, scale, offset) in rotations {
            let rotation =
                cphase
                    .affine(scale, offset)
                    .ok_or_else(|| ParameterError::WrongType {
                        name: "cphase".to_owned(),
                        expected: "a number",
                        found: cphase.kind().to_owned(),
                    })?;
            let mut basis_rotation = IndexMap::new();
            basis_rotation.insert(qb_name.clone(), rotation);
            pulses[index].set("basis_rotation", basis_rotation);
        }
        Ok(pulses)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use approx::assert_relative_eq;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::super::tests::{builder, OPERATIONS};
    use crate::builder::{
        BuilderConfig, BuilderError, CircuitBuilder, DecompositionPolicy, QubitSelection,
    };
    use crate::operation::OperationDict;
    use crate::parameter::ParamValue;
    use crate::qubits::{NonlinearityCorrection, QubitConfig};

    fn builder_with(config: BuilderConfig) -> CircuitBuilder {
        CircuitBuilder::new(OperationDict::from_json(OPERATIONS).unwrap(), config)
    }

    fn basis_rotation(pulse: &crate::parameter::PulseParams, qb_name: &str) -> f64 {
        pulse.value("basis_rotation").unwrap().as_map().unwrap()[qb_name]
            .as_f64()
            .unwrap()
    }

    #[rstest]
    #[case("X90 qb1", 0.25)]
    #[case("X45 qb1", 0.125)]
    #[case("mY45 qb2", -0.125)]
    #[case("X180 0", 0.5)]
    #[case("Y-90 qb1", -0.25)]
    fn drive_amplitudes_scale_with_the_angle(#[case] op: &str, #[case] amplitude: f64) {
        let pulse = builder().get_pulse(op).unwrap();
        assert_relative_eq!(pulse.f64("amplitude").unwrap(), amplitude);
    }

    #[rstest]
    #[case("X45 0")]
    #[case("sX180 qb1")]
    #[case("X90s qb2")]
    #[case("sX90 qb2")]
    fn single_pulses_keep_the_requested_op_code(#[case] op: &str) {
        let pulse = builder().get_pulse(op).unwrap();
        assert_eq!(pulse.op_code(), Some(op));
    }

    #[test]
    fn simultaneous_operations_start_with_the_previous_pulse() {
        let builder = builder();
        let simultaneous = builder.get_pulse("sX90 qb2").unwrap();
        assert_eq!(simultaneous.str("ref_point"), Some("start"));
        assert_relative_eq!(simultaneous.f64("amplitude").unwrap(), 0.25);
        assert!(builder.get_pulse("X90 qb2").unwrap().value("ref_point").is_none());
    }

    #[test]
    fn dictionary_keys_are_matched_verbatim() {
        let mut operations: serde_json::Value = serde_json::from_str(OPERATIONS).unwrap();
        let mut x180s = operations["X180 qb1"].clone();
        x180s["amplitude"] = serde_json::json!(0.3);
        operations["sweeps qb1"] = x180s;
        let builder = CircuitBuilder::new(
            OperationDict::from_json(&operations.to_string()).unwrap(),
            BuilderConfig::default(),
        );
        let pulse = builder.get_pulse("sweeps qb1").unwrap();
        assert_relative_eq!(pulse.f64("amplitude").unwrap(), 0.3);
        assert_eq!(pulse.op_code(), Some("sweeps qb1"));
        assert_eq!(pulse.str("ref_point"), Some("start"));
    }

    #[test]
    fn nonlinearity_correction_is_applied() {
        let mut qubits = IndexMap::new();
        qubits.insert(
            "qb1".to_owned(),
            QubitConfig {
                nonlinearity_correction: NonlinearityCorrection::OddPolynomial {
                    coefficients: vec![0.9, 0.1],
                },
            },
        );
        let builder = builder_with(BuilderConfig {
            qubits,
            ..BuilderConfig::default()
        });
        let pulse = builder.get_pulse("X45 qb1").unwrap();
        assert_relative_eq!(pulse.f64("amplitude").unwrap(), 0.5 * 0.25 * 0.90625);
        // calibrated pulses are taken as they are
        let pulse = builder.get_pulse("X180 qb1").unwrap();
        assert_relative_eq!(pulse.f64("amplitude").unwrap(), 0.5);
    }

    #[test]
    fn virtual_z_rotations() {
        let builder = builder();
        let pulse = builder.get_pulse("Z90 qb1").unwrap();
        assert_eq!(pulse.pulse_type(), Some("VirtualPulse"));
        assert_relative_eq!(basis_rotation(&pulse, "qb1"), 90.0);
        assert_relative_eq!(basis_rotation(&builder.get_pulse("mZ45 qb2").unwrap(), "qb2"), -45.0);

        let pulses = builder.z_gate(30.0, &QubitSelection::All).unwrap();
        assert_eq!(pulses.len(), 2);
        assert_relative_eq!(basis_rotation(&pulses[1], "qb2"), 30.0);
    }

    #[test]
    fn parametric_angles_resolve_at_sweep_points() {
        let builder = builder();
        let mut drive = builder.get_pulse("X:theta qb1").unwrap();
        assert_eq!(drive.unresolved_parameters(), vec!["theta"]);
        drive
            .resolve_parametric(&HashMap::from([("theta".to_owned(), 90.0)]))
            .unwrap();
        assert_relative_eq!(drive.f64("amplitude").unwrap(), 0.25);

        let mut z = builder.get_pulse("mZ:2*[phi] qb2").unwrap();
        z.resolve_parametric(&HashMap::from([("phi".to_owned(), 10.0)]))
            .unwrap();
        assert_relative_eq!(basis_rotation(&z, "qb2"), -20.0);
    }

    #[test]
    fn controlled_phase_gates() {
        let builder = builder();
        let cz = builder.get_pulse("CZ qb1 qb2").unwrap();
        assert_eq!(cz.pulse_type(), Some("NZTransitionControlledPulse"));
        assert!(cz.value("cphase").is_none());
        assert_eq!(
            builder.get_cz_operation_name("qb1", "qb2", None).unwrap(),
            "CZ_nztc qb2 qb1"
        );

        let cz = builder.get_pulse("mCZ45 qb2 qb1").unwrap();
        assert_eq!(cz.value("cphase"), Some(&ParamValue::Number(-45.0)));
        assert_eq!(cz.op_code(), Some("mCZ45 qb2 qb1"));

        let bf = builder.get_pulse("CZ_bf qb2 qb1").unwrap();
        assert_eq!(bf.pulse_type(), Some("BufferedCZPulse"));
        assert!(matches!(
            builder.get_pulses("CZ_bf qb1 qb7"),
            Err(BuilderError::Qubit(_)) | Err(BuilderError::CzNotFound { .. })
        ));
    }

    #[test]
    fn controlled_phase_gates_decompose() {
        let mut decompose_rotation_gates = IndexMap::new();
        decompose_rotation_gates.insert("CZ_nztc".to_owned(), DecompositionPolicy::All(true));
        let builder = builder_with(BuilderConfig {
            decompose_rotation_gates,
            ..BuilderConfig::default()
        });
        let pulses = builder.get_pulses("CZ90 qb1 qb2").unwrap();
        assert_eq!(pulses.len(), 12);
        assert_eq!(pulses[1].op_code(), Some("CZ_nztc qb2 qb1"));
        assert_eq!(pulses[7].op_code(), Some("CZ_nztc qb2 qb1"));
        assert!(pulses[1].value("cphase").is_none());
        assert_relative_eq!(basis_rotation(&pulses[4], "qb1"), 45.0);
        assert_relative_eq!(basis_rotation(&pulses[10], "qb1"), 135.0);
        assert_relative_eq!(basis_rotation(&pulses[11], "qb2"), -45.0);

        // without an angle there is nothing to decompose
        assert_eq!(builder.get_pulses("CZ qb1 qb2").unwrap().len(), 1);
    }

    #[test]
    fn decomposition_policy_restricts_pairs() {
        let mut decompose_rotation_gates = IndexMap::new();
        decompose_rotation_gates.insert(
            "CZ_nztc".to_owned(),
            DecompositionPolicy::Pairs(vec![["qb2".to_owned(), "qb1".to_owned()]]),
        );
        let builder = builder_with(BuilderConfig {
            decompose_rotation_gates,
            ..BuilderConfig::default()
        });
        let pulses = builder.get_pulses("CZ:theta qb1 qb2").unwrap();
        assert_eq!(pulses.len(), 12);
        assert_eq!(pulses[0].op_code(), Some("Y90 qb2"));
        let rotation = pulses[11].value("basis_rotation").unwrap().as_map().unwrap();
        let ParamValue::Parametric(parametric) = &rotation["qb1"] else {
            panic!("expected a parametric rotation, got {rotation:?}");
        };
        assert_eq!(parametric.op_code[0], "Z");
        assert_relative_eq!(parametric.resolve(90.0).unwrap(), -45.0);
    }

    #[test]
    fn unsupported_operations() {
        let mut decompose_rotation_gates = IndexMap::new();
        decompose_rotation_gates.insert("X".to_owned(), DecompositionPolicy::All(true));
        let builder = builder_with(BuilderConfig {
            decompose_rotation_gates,
            ..BuilderConfig::default()
        });
        assert!(matches!(
            builder.get_pulses("X45 qb1"),
            Err(BuilderError::SingleQubitDecomposition(_))
        ));
        assert!(matches!(
            builder.get_pulses("Foo qb1"),
            Err(BuilderError::OperationNotFound(_))
        ));
        assert!(matches!(
            builder.get_pulses("X45 qb1 qb2"),
            Err(BuilderError::OperandCount { expected: 1, .. })
        ));
        assert!(matches!(
            builder.get_pulse("CZ90 qb1 qb2"),
            Ok(_)
        ));
    }
}
