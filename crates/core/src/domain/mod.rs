pub mod approval;
pub mod category;
pub mod event;
pub mod org_unit;
pub mod period;
pub mod user;
