//! The ingest → match → notify cycle and the services around it.
//!
//! External systems (the listing page, the geocoder, the mail relay) are
//! reached only through the traits in [`collaborators`], so every piece of
//! the cycle can be exercised with in-process fakes.

pub mod collaborators;
pub mod cycle;
pub mod delivery;
pub mod error;
pub mod ranking;
pub mod registry;
pub mod services;
pub mod worker;

pub use collaborators::{Geocoder, Notifier, PriceSource};
pub use cycle::{CycleReport, CycleRunner, DispatchOutcome, TriggerSource};
pub use delivery::{LogNotifier, SmtpNotifier};
pub use error::{
    AcquisitionError, CycleError, DeliveryError, GeocodeError, RegistryError, SchedulerError,
};
pub use ranking::{GradeListing, PriceQuery};
pub use registry::{SubscribeOutcome, SubscriptionService};
pub use services::{Services, ServicesError};
pub use worker::{spawn_cycle_worker, CycleHandle, TriggerOutcome, WorkerState, WorkerStatus};
