mod clinics;
mod common;
mod patients;
mod videos;

pub use clinics::SqliteClinicRepo;
pub use patients::SqlitePatientRepo;
pub use videos::SqliteVideoRepo;
