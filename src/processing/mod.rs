pub mod extractors;
pub mod field_correction;
pub mod locator;
pub mod mrz;
pub mod normalizer;

pub use locator::{CandidateValue, FieldCandidate, FieldLocator, Located};
pub use mrz::{MrzDecoder, MrzLines, MrzLocator};
pub use normalizer::TextNormalizer;
