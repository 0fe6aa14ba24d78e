mod clinics;
mod patients;
mod videos;

pub use clinics::PostgresClinicRepo;
pub use patients::PostgresPatientRepo;
pub use videos::PostgresVideoRepo;
