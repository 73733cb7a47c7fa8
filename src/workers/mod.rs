pub mod delivery;

pub use delivery::{DeliveryWorker, SweepReport};
