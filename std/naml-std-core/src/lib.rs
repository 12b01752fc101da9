//!
//! naml-std-core - Core Runtime Types
//!
//! The heap layouts a native library needs to hand values back to naml code:
//!
//! - `HeapHeader` and `HeapTag` for reference-counted heap objects
//! - `NamlString` for UTF-8 text
//! - `NamlBytes` for binary payloads
//! - `NamlArray` for lists of 64-bit values
//! - Exception slot primitives for raising typed exceptions
//!
//! Values cross the boundary as 64-bit words: inline primitives or pointers
//! to objects that start with a `HeapHeader`.
//!

pub mod value;
pub mod array;
pub mod bytes;
pub mod exception;

pub use value::*;
pub use array::*;
pub use bytes::*;
pub use exception::*;
