#![allow(dead_code)]
#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(unused_mut)]

pub mod app;
pub mod app_config;
pub mod error;
pub mod job;
pub mod time_util;
pub mod trading;

pub const ENVIRONMENT_LOCAL: &str = "LOCAL";
