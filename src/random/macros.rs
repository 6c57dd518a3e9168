/// Use this to define a unique type which names an independent random
/// number stream. Streams are seeded from the base seed, a hash of this
/// name, and a per-unit key (see [`crate::random::stream_rng`]).
#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        #[derive(Copy, Clone)]
        pub struct $random_id;

        impl $crate::random::RngId for $random_id {
            type RngType = $crate::rand::rngs::SmallRng;

            fn get_name() -> &'static str {
                stringify!($random_id)
            }
        }
    };
}
pub use define_rng;
