pub mod ai;
pub mod appointments;
pub mod booking;
pub mod clock;
pub mod conversation;
pub mod nlu;
pub mod policy;
pub mod reply;
pub mod session;
