pub mod app;
pub mod artwork;
pub mod audio;
pub mod config;
pub mod controller;
pub mod input;
pub mod logging;
pub mod message;
pub mod model;
pub mod reactive;
pub mod ui;
