pub mod server;

use crate::api::ServerConfig;

/// Actions the CLI can dispatch to.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        config: ServerConfig,
    },
}
