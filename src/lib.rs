pub mod app;
pub mod config;
pub mod cycle;
pub mod gesture;
pub mod logging;
pub mod model;
pub mod overlay;
pub mod playback;
pub mod scanner;
pub mod session;
pub mod timer;
pub mod ui;
