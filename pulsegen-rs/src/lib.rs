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

//! Compile symbolic quantum-control experiments into timed, per-channel waveforms.
//!
//! Within this crate you'll find:
//!
//! * A [parser] for the compact operation-code language (`"X90 qb1"`, `"sZ:theta qb2"`,
//!   `"CZ_nztc40 qb3 qb2"`) and the bracketed [angle expressions] it embeds
//! * A [circuit builder] which resolves operation codes against an [operation dictionary],
//!   decomposes arbitrary-phase CZ gates, assembles [blocks] of time-referenced pulses and
//!   expands one- and two-dimensional sweeps into [segments] and [sequences]
//! * A [pulse library] which renders resolved pulse parameters into sampled waveforms per
//!   output channel, together with the cache keys that make waveform generation cacheable
//!
//! Prior to `v1.0`, minor-version changes are considered breaking changes.
//!
//! [angle expressions]: crate::expression::Expression
//! [blocks]: crate::sequence::Block
//! [circuit builder]: crate::builder::CircuitBuilder
//! [operation dictionary]: crate::operation::OperationDict
//! [parser]: crate::parser::OpCode
//! [pulse library]: crate::pulse::PulseShape
//! [segments]: crate::sequence::Segment
//! [sequences]: crate::sequence::Sequence

pub mod builder;
pub mod expression;
pub(crate) mod hash;
pub mod operation;
pub mod parameter;
pub mod parser;
pub mod pulse;
pub mod qubits;
pub mod sequence;
pub mod sweep;
pub mod units;

pub use builder::{BuilderConfig, BuilderError, CircuitBuilder};
pub use operation::OperationDict;
pub use parameter::{ParamValue, ParametricValue, PulseParams};
