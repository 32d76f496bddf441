#![allow(clippy::single_match)]
#![allow(clippy::verbose_bit_mask)]
#![allow(clippy::cognitive_complexity)]

#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate quick_error;

#[cfg(test)]
extern crate pretty_assertions;

pub mod asm;
pub mod bios;
pub mod config;
pub mod cpu;
pub mod hex;
pub mod machine;
pub mod memory;
pub mod string;
