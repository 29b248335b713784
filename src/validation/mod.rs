pub mod checksum;
pub mod classifier;
pub mod expiry;
pub mod format;

pub use checksum::ChecksumValidator;
pub use classifier::DocumentClassifier;
pub use expiry::ExpiryValidator;
pub use format::FormatValidator;
