pub mod crm_repo;
pub use crm_repo::CrmRepository;
pub mod form_repo;
pub use form_repo::FormRepository;
pub mod analysis_repo;
pub use analysis_repo::AnalysisRepository;
pub mod invite_repo;
pub use invite_repo::InviteRepository;
