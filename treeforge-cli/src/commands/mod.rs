pub mod devices;
pub mod script;
pub mod upload;
