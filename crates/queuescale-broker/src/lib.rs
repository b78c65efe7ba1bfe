//! queuescale-broker — HTTP clients for the message broker side.
//!
//! Two read-only clients share one bounded-timeout JSON GET helper:
//!
//! ```text
//! ManagementClient  GET /api/queues/{vhost}/{queue}  -> messages_ready
//! InspectClient     GET INSPECT_URL                  -> worker -> [task]
//! ```
//!
//! Both only report errors. Whether a failure means "empty queue" or
//! "assume busy" is decided by the autoscaler.

pub mod client;
pub mod inspect;
pub mod management;

pub use inspect::InspectClient;
pub use management::ManagementClient;
