//! The module for the i31ref CLI commands.

mod eq;
mod inspect;

pub use self::{eq::*, inspect::*, test::*};
