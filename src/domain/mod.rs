pub mod diagram;
pub mod weather;

pub use diagram::*;
pub use weather::*;
