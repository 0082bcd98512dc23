pub mod cache;
pub mod clients;
pub mod model;
pub mod services;
pub mod task;
