#![deny(missing_docs)]
#![doc = "Shared error taxonomy, parameter configuration and lookup services for EFT scaling studies."]

pub mod errors;
pub mod params;
pub mod particles;

pub use errors::{EftError, ErrorInfo};
pub use params::{InactiveParameter, Parameter, ParameterConfig, SampleOffset};
pub use particles::ParticleTable;
