pub mod error;
pub mod queue;
pub mod store;

pub use error::StoreError;
pub use queue::{DoctorQueue, PositionChange, QueueKey};
pub use store::MemoryDatabase;
