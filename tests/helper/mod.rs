#![allow(dead_code)]

mod server;
mod vendor;

pub use server::*;
pub use vendor::*;
