//! HTTP 请求处理器

pub mod health;
pub mod motivate;

pub use health::handle_health;
pub use motivate::handle_motivate;
