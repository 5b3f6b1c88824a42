pub mod book_state;
pub mod engine_worker;
pub mod store;
