pub mod service;

pub use service::{spawn, EngineHandle, ServiceError};
