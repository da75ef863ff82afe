//! Controller firmware protocols

pub mod marlin;
