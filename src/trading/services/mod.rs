pub mod cleanup_service;
pub mod evaluation_service;
pub mod inference_service;
pub mod job_config_service;
pub mod ranking_service;
