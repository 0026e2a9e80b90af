pub mod aggregate;
pub mod events;
pub mod messages;
pub mod ports;

pub use aggregate::*;
pub use events::*;
pub use messages::*;
pub use ports::*;
