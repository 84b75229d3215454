pub mod allocate;
pub mod budget;
pub mod classify;
