//! Room records and their storage.

mod file_store;
mod model;
mod store;

pub use file_store::FileRoomStore;
pub use model::{Room, RoomSummary, RoomUpdate, Song};
pub use store::{MemoryRoomStore, RoomStore, StoreError, StoreResult};

#[cfg(test)]
pub(crate) use store::test_support;
