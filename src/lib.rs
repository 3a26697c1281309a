pub mod app;
pub mod dom;
pub mod net;
pub mod search;
pub mod text;
pub mod view;
