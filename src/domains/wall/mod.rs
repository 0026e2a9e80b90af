pub mod events;
pub mod grid;
pub mod obstacles;
pub mod surface;

pub use events::*;
pub use grid::*;
pub use obstacles::*;
pub use surface::*;
