//! Job workers.

mod side_effect;

pub use side_effect::side_effect_worker;
