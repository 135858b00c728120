pub mod decoder;
pub mod scanner;

pub use decoder::{decode, DecodedReading};
pub use scanner::{advertisement_stream, open_adapter};
