mod clinic;
mod patient;
mod validators;
mod video;

pub use clinic::*;
pub use patient::*;
pub use video::*;
