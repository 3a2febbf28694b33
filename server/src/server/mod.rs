mod server;
pub use server::Server;
pub(crate) use server::CallHandler;
