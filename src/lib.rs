pub use keel_core::*;
