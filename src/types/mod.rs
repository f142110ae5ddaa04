// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Revisions, instances, service names, and replica quantities.

mod id;
mod quantity;
mod revision;
mod service_name;

pub use id::{Id, InstanceId, InstanceMarker, RevisionId, RevisionMarker};
pub use quantity::{Quantity, QuantityError, Rounding};
pub use revision::{Instance, Revision};
pub use service_name::{ServiceName, ServiceNameError};
