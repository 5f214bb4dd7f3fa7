mod error;
mod headers;
mod server;

pub use error::RelayError;
pub use headers::{Credential, FORWARDED_FOR_HEADER, ForwardedContext, REFERER_HEADER, TITLE_HEADER};
pub use server::{AppState, PROXY_PATH, RelayServer, create_router};
