pub mod job_card;
pub mod service_order;
pub mod session;
pub mod user;
