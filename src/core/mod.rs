pub mod actions;
pub mod domain;
pub mod events;
pub mod flows;
pub mod forms;
pub mod sessions;
pub mod slots;
pub mod stories;
pub mod tracker;
pub mod validator;
