pub mod app;
pub mod backend;
pub mod cache;
pub mod config;
pub mod model;
pub mod schedule;
pub mod sequencer;
pub mod theme;
pub mod ui;
pub mod view;
