pub mod analysis_gateway;
pub mod analysis_service;
pub mod crm_service;
pub mod form_engine;
pub mod form_service;
pub mod invite_service;
pub mod reminder_service;
pub mod workflow;
