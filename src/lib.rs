#![forbid(unsafe_code)]

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate log;

//Application Imports/Exports
pub mod allocator;
pub mod cas_lock;
pub mod cis;
pub mod config;
pub mod constants;
pub mod fabric;
pub mod memory_registration;
pub mod metadata;
pub mod objects;
pub mod permission;
