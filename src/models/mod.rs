pub mod appointment;
pub mod booking;
pub mod catalog;
pub mod conversation;
pub mod intent;

pub use appointment::Appointment;
pub use booking::{BookingContext, BookingStage, SlotOption};
pub use catalog::{Catalog, Service, Spa};
pub use conversation::ConversationMessage;
pub use intent::{Intent, Language, NluResult, TimeRange};
