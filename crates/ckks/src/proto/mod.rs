//! Protobuf definitions for the CKKS types, generated from `ckks.proto`.

mod generated;

pub use generated::*;
