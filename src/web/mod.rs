// HTTP layer: routes, handlers and the data-URL codec

mod app;
mod error;
mod extract_request_data;
mod handlers;
mod image_codec;
mod listeners;
mod models;


pub use app::create_app;
pub use listeners::create_listener;

use crate::config::ServerConfig;
use std::sync::Arc;

pub type SharedConfig = Arc<ServerConfig>;
