//! Job definitions.

mod side_effect;

pub use side_effect::SideEffectJob;
