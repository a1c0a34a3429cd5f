//! Startup configuration, from command-line flags or `APISERVER_*` variables

use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Bridges a Teeworlds ECON console to an HTTP command API and a WebSocket event feed"
)]
pub struct BridgeConfig {
    /// ECON host to connect to
    #[arg(long, env = "APISERVER_ECON_HOST", default_value = "127.0.0.1")]
    pub econ_host: String,

    /// ECON port
    #[arg(long, env = "APISERVER_ECON_PORT", default_value = "8303")]
    pub econ_port: u16,

    /// ECON password (ec_password on the game server)
    #[arg(long, env = "APISERVER_ECON_PASSWORD", hide_env_values = true)]
    pub econ_password: String,

    /// Address for the HTTP command API
    #[arg(long, env = "APISERVER_WEB_HOST", default_value = "127.0.0.1")]
    pub web_host: String,

    #[arg(long, env = "APISERVER_WEB_PORT", default_value = "8080")]
    pub web_port: u16,

    /// Address for the WebSocket event feed
    #[arg(long, env = "APISERVER_WS_HOST", default_value = "127.0.0.1")]
    pub ws_host: String,

    #[arg(long, env = "APISERVER_WS_PORT", default_value = "8081")]
    pub ws_port: u16,

    /// Seconds to wait before reconnecting to ECON
    #[arg(long, default_value = "5")]
    pub reconnect_delay_secs: u64,
}

impl BridgeConfig {
    pub fn web_addr(&self) -> String {
        format!("{}:{}", self.web_host, self.web_port)
    }

    pub fn ws_addr(&self) -> String {
        format!("{}:{}", self.ws_host, self.ws_port)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}
