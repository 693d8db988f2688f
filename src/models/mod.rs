pub mod appointment;
pub mod directory;
pub mod enums;
pub mod notification;
pub mod triage;

pub use appointment::*;
pub use directory::*;
pub use notification::*;
pub use triage::*;
