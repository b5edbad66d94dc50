use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

/// Turn a hashable thing into a u64 digest.
#[inline]
pub(crate) fn hash_to_u64<T: Hash + ?Sized>(t: &T) -> u64 {
    let mut s = DefaultHasher::new();
    t.hash(&mut s);
    s.finish()
}

/// The bits a float is hashed and compared by: `+0.0` and `-0.0` share one representation,
/// as do all NaNs.
#[inline]
pub(crate) fn canonical_f64_bits(value: f64) -> u64 {
    if value == 0.0f64 {
        0.0f64.to_bits()
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

/// Hashes a f64 using its canonical u64 representation.
#[inline]
pub(crate) fn hash_f64<H: Hasher>(value: f64, state: &mut H) {
    canonical_f64_bits(value).hash(state)
}

#[cfg(test)]
mod test {
    use super::{hash_f64, hash_to_u64};
    use std::{collections::hash_map::DefaultHasher, hash::Hasher};

    fn get_f64_hash(float: f64) -> u64 {
        let mut hasher = DefaultHasher::new();
        hash_f64(float, &mut hasher);
        hasher.finish()
    }

    #[test]
    fn signed_zeros_hash_equal() {
        assert_eq!(get_f64_hash(0.0), get_f64_hash(-0.0))
    }

    #[test]
    fn nans_hash_equal() {
        assert_eq!(get_f64_hash(f64::NAN), get_f64_hash(-f64::NAN))
    }

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(hash_to_u64("X180 qb1"), hash_to_u64("X180 qb1"));
        assert_ne!(hash_to_u64("X180 qb1"), hash_to_u64("X180 qb2"));
    }
}
