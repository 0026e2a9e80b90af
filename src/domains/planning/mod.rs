pub mod astar;
pub mod coverage;
pub mod path;
pub mod planner;

pub use astar::*;
pub use coverage::*;
pub use path::*;
pub use planner::*;
