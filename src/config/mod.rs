pub mod options;

pub use options::{KspOptions, OptionsDatabase, PcOptions, PcSide, OPTIONS_ENV};
