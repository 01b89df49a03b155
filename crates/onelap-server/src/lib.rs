pub mod client;
pub mod handlers;
pub mod pages;
pub mod server;
pub mod validator;
pub mod wire;

pub use server::{start, ServerConfig, ServerHandle};
pub use validator::{IngressValidator, PayloadKind, StructuralValidator, ValidationError};
