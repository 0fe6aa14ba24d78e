mod clinics;
mod patients;
mod videos;

pub use clinics::*;
pub use patients::*;
pub use videos::*;
