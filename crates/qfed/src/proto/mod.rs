//! Protobuf definitions for the encrypted updates, generated from `qfed.proto`.

mod generated;

pub use generated::*;
