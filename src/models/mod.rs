pub mod enums;
pub mod history;
pub mod schedule;

pub use enums::*;
pub use history::*;
pub use schedule::*;
