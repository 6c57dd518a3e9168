use log::trace;

use crate::context::Context;
use crate::random::{stream_rng, RngId, RngPlugin};

// This is a trait extension on Context for
// random number generation functionality.
pub trait ContextRandomExt {
    /// Stores the base seed that every stream is derived from.
    fn init_random(&mut self, base_seed: u64);

    /// Returns the base seed.
    ///
    /// # Panics
    ///
    /// Panics if `init_random` was not called yet.
    fn get_base_seed(&self) -> u64;

    /// Creates the generator for stream `R` and unit `key`.
    ///
    /// # Panics
    ///
    /// Panics if `init_random` was not called yet.
    fn stream_rng<R: RngId>(&self, rng_id: R, key: u64) -> R::RngType;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module with base seed {base_seed}");
        self.get_data_mut(RngPlugin).base_seed = Some(base_seed);
    }

    fn get_base_seed(&self) -> u64 {
        self.get_data(RngPlugin)
            .and_then(|data| data.base_seed)
            .expect("You must initialize the random number generator with a base seed")
    }

    fn stream_rng<R: RngId>(&self, _rng_id: R, key: u64) -> R::RngType {
        stream_rng::<R>(self.get_base_seed(), key)
    }
}
