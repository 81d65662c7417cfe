pub mod model;
pub mod store;

pub use model::Timetable;
pub use store::TimetableStore;
pub use store::memory::InMemoryTimetableStore;
pub use store::sqlite_store::SqliteTimetableStore;
