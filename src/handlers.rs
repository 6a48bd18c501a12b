pub mod analysis;
pub mod customers;
pub mod dashboard;
pub mod forms;
pub mod invites;
