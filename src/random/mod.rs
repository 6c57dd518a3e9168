//! Seeded random number streams.
//!
//! Every logical unit of work (event processing in one node, travel into one
//! node, NPI decisions in one node) owns its own generator. A stream is named
//! with [`define_rng!`] and keyed by a stable integer such as a node id, so
//! adding a node or reordering work never perturbs another unit's draws.
mod context_ext;
mod macros;

pub use context_ext::ContextRandomExt;
pub use macros::define_rng;

use crate::define_data_plugin;
use crate::hashing::hash_str;
use crate::rand::SeedableRng;

pub trait RngId: Copy + Clone {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

// Odd 64-bit constant used to spread consecutive keys across the seed space
const KEY_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

struct RngData {
    base_seed: Option<u64>,
}

define_data_plugin!(RngPlugin, RngData, RngData { base_seed: None });

/// Creates the generator for stream `R` and unit `key` from `base_seed`
///
/// The same `(base_seed, R, key)` always yields the same sequence.
#[must_use]
pub fn stream_rng<R: RngId>(base_seed: u64, key: u64) -> R::RngType {
    let seed = base_seed
        .wrapping_add(hash_str(R::get_name()))
        .wrapping_add(key.wrapping_mul(KEY_MULTIPLIER));
    R::RngType::seed_from_u64(seed)
}
