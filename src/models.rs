pub mod analysis;
pub mod crm;
pub mod form;
pub mod reminder;
pub mod invite;
