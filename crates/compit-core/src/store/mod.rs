// ── Reactive data store ──
//
// Lock-free device storage with push-based change notification.

mod collection;
mod merge;

pub use collection::{DeviceStore, Snapshot};
pub use merge::apply_delta;

#[cfg(test)]
pub(crate) use collection::tests::instance as test_instance;
