mod core;
mod swagger;
mod tracing;

pub use self::core::Middleware;
pub use self::swagger::SwaggerMiddleware;
pub use self::tracing::TracingMiddleware;
