//! Timelapser core: chat command dispatch, camera override state and the scheduled
//! frame capture loop.
//!
//! Rendering, the game session protocol and image encoding live behind the traits in
//! [`agent`]. This crate only decides when a frame is taken and from which pose.

pub mod agent;
pub mod bot;
pub mod camera;
pub mod capture;
pub mod chat;
pub mod command;
pub mod error;
pub mod pose;
pub mod world;

pub use bot::Bot;
pub use error::CommandError;
pub use world::{Pose, Vec3};
