pub mod document;
pub mod json_store;
