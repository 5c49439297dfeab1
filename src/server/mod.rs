pub mod admin;
pub mod builder;
pub mod handler;
pub mod listener;

pub use admin::AdminHandler;
pub use builder::ServerBuilder;
pub use handler::RequestHandler;
