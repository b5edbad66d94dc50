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

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::hash::{canonical_f64_bits, hash_f64};

/// One entry of a pulse's cache key.
///
/// Two pulses with equal hashables on a channel render identical samples on that channel.
#[derive(Clone, Debug)]
pub enum Hashable {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl PartialEq for Hashable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Hashable::None, Hashable::None) => true,
            (Hashable::Bool(a), Hashable::Bool(b)) => a == b,
            (Hashable::Int(a), Hashable::Int(b)) => a == b,
            (Hashable::Float(a), Hashable::Float(b)) => {
                canonical_f64_bits(*a) == canonical_f64_bits(*b)
            }
            (Hashable::Str(a), Hashable::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Hashable {}

impl Hash for Hashable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Hashable::None => {}
            Hashable::Bool(value) => value.hash(state),
            Hashable::Int(value) => value.hash(state),
            Hashable::Float(value) => hash_f64(*value, state),
            Hashable::Str(value) => value.hash(state),
        }
    }
}

impl fmt::Display for Hashable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hashable::None => write!(f, "None"),
            Hashable::Bool(value) => write!(f, "{value}"),
            Hashable::Int(value) => write!(f, "{value}"),
            Hashable::Float(value) => write!(f, "{value:e}"),
            Hashable::Str(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<f64> for Hashable {
    fn from(value: f64) -> Self {
        Hashable::Float(value)
    }
}

impl From<bool> for Hashable {
    fn from(value: bool) -> Self {
        Hashable::Bool(value)
    }
}

impl From<usize> for Hashable {
    fn from(value: usize) -> Self {
        Hashable::Int(value as i64)
    }
}

impl From<&str> for Hashable {
    fn from(value: &str) -> Self {
        Hashable::Str(value.to_owned())
    }
}

impl<T: Into<Hashable>> From<Option<T>> for Hashable {
    fn from(value: Option<T>) -> Self {
        value.map_or(Hashable::None, Into::into)
    }
}

/// Build a `Vec<Hashable>` from heterogeneous values.
macro_rules! hashables {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::pulse::Hashable::from($value)),*]
    };
}

pub(crate) use hashables;
