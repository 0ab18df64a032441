// Core modules implementing the streaming engines, utilities, and error modeling.
pub mod cancel;
pub mod chunk;
pub mod error;
pub mod json_stream;
pub mod lines;
pub mod retry;
pub mod size;
pub mod units;
