pub mod appointment;
pub mod confirmation;
pub mod poller;

pub use appointment::AppointmentService;
pub use confirmation::ConfirmationService;
pub use poller::{
    ConfirmationNotice, ConfirmationPoller, ConfirmationSource, HttpConfirmationSource,
    PollerConfig, PollerHandle, PollerState, RefreshHook,
};
