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

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use ndarray::Array1;

use super::Hashable;
use crate::hash::{canonical_f64_bits, hash_to_u64};

/// The identity of a rendered chunk of samples: a pulse's hashables for one channel plus the
/// sampling grid they were rendered on.
#[derive(Clone, Debug)]
pub struct WaveformKey {
    digest: u64,
    hashables: Vec<Hashable>,
    n_samples: usize,
    sample_rate: u64,
}

impl WaveformKey {
    pub fn new(hashables: Vec<Hashable>, n_samples: usize, sample_rate: f64) -> Self {
        let sample_rate = canonical_f64_bits(sample_rate);
        let digest = hash_to_u64(&(&hashables, n_samples, sample_rate));
        Self {
            digest,
            hashables,
            n_samples,
            sample_rate,
        }
    }

    pub fn digest(&self) -> u64 {
        self.digest
    }
}

impl PartialEq for WaveformKey {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
            && self.n_samples == other.n_samples
            && self.sample_rate == other.sample_rate
            && self.hashables == other.hashables
    }
}

impl Eq for WaveformKey {}

impl Hash for WaveformKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.digest);
    }
}

/// Previously rendered samples, keyed by [`WaveformKey`].
#[derive(Clone, Debug, Default)]
pub struct WaveformCache {
    entries: HashMap<WaveformKey, Array1<f64>>,
    hits: usize,
    misses: usize,
}

impl WaveformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached samples for `key`, rendering and storing them on a miss.
    ///
    /// Keys without hashables identify nothing and are always rendered afresh.
    pub fn get_or_render(
        &mut self,
        key: WaveformKey,
        render: impl FnOnce() -> Array1<f64>,
    ) -> Array1<f64> {
        if key.hashables.is_empty() {
            return render();
        }
        if let Some(samples) = self.entries.get(&key) {
            self.hits += 1;
            tracing::trace!(digest = key.digest, "waveform cache hit");
            return samples.clone();
        }
        self.misses += 1;
        let samples = render();
        self.entries.insert(key, samples.clone());
        samples
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array1;

    use super::{WaveformCache, WaveformKey};
    use crate::pulse::hashables;

    #[test]
    fn renders_once_per_key() {
        let mut cache = WaveformCache::new();
        let key = || WaveformKey::new(hashables!["SquarePulse", 0.0, 1e-8, 0.5], 10, 1e9);
        let mut renders = 0;
        for _ in 0..3 {
            let samples = cache.get_or_render(key(), || {
                renders += 1;
                Array1::from_elem(10, 0.5)
            });
            assert_eq!(samples.len(), 10);
        }
        assert_eq!(renders, 1);
        assert_eq!((cache.hits(), cache.misses(), cache.len()), (2, 1, 1));
    }

    #[test]
    fn sampling_grid_is_part_of_the_key() {
        let mut cache = WaveformCache::new();
        let hashables = hashables!["SquarePulse", 0.0, 1e-8, 0.5];
        cache.get_or_render(WaveformKey::new(hashables.clone(), 10, 1e9), || {
            Array1::zeros(10)
        });
        cache.get_or_render(WaveformKey::new(hashables, 20, 2e9), || Array1::zeros(20));
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn empty_keys_are_not_stored() {
        let mut cache = WaveformCache::new();
        cache.get_or_render(WaveformKey::new(Vec::new(), 4, 1e9), || Array1::zeros(4));
        assert!(cache.is_empty());
    }
}
