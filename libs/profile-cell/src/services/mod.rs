pub mod family;
pub mod insurance;
pub mod profile;
pub mod resident;

pub use family::FamilyService;
pub use insurance::InsuranceService;
pub use profile::ProfileService;
