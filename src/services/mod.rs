pub mod access;
pub mod assistant;
pub mod attachments;
pub mod auth;
pub mod manuals;
pub mod records;
pub mod session;
pub mod users;
