//! Runtime configuration from the environment.
//!
//! Every knob has a default that brings the server up locally; malformed
//! values fall back with a warning rather than aborting startup.

use std::net::SocketAddr;

use reqwest::Url;
use tracing::warn;

use crate::demo_data::DemoData;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:7860";
const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";
const DEFAULT_DSP_CODE: &str = "DEMO";
const DEFAULT_STATUS_ID: &str = "active";

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the API listens on. `VAN_LISTEN_ADDR`.
    pub listen_addr: SocketAddr,
    /// Base URL of the fleet backend. `VAN_BACKEND_URL`.
    pub backend_base_url: Url,
    /// Tenant scoping every backend call. `VAN_DSP_CODE`.
    pub dsp_code: String,
    /// Opaque status id stamped on writes. `VAN_STATUS_ID`.
    pub default_status_id: String,
    /// When set (`SMALL`/`LARGE`), run against a seeded in-memory backend
    /// instead of the real one. `VAN_DEMO`.
    pub demo: Option<DemoData>,
}

impl Config {
    pub fn from_env() -> Self {
        let listen_addr = parse_or_default(
            "VAN_LISTEN_ADDR",
            std::env::var("VAN_LISTEN_ADDR").ok(),
            DEFAULT_LISTEN_ADDR,
        );
        let backend_base_url = parse_or_default(
            "VAN_BACKEND_URL",
            std::env::var("VAN_BACKEND_URL").ok(),
            DEFAULT_BACKEND_URL,
        );
        let demo = match std::env::var("VAN_DEMO").ok() {
            None => None,
            Some(raw) => match raw.parse::<DemoData>() {
                Ok(demo) => Some(demo),
                Err(()) => {
                    warn!(value = %raw, "VAN_DEMO is not SMALL or LARGE, ignoring");
                    None
                }
            },
        };

        Self {
            listen_addr,
            backend_base_url,
            dsp_code: std::env::var("VAN_DSP_CODE").unwrap_or_else(|_| DEFAULT_DSP_CODE.into()),
            default_status_id: std::env::var("VAN_STATUS_ID")
                .unwrap_or_else(|_| DEFAULT_STATUS_ID.into()),
            demo,
        }
    }
}

fn parse_or_default<T: std::str::FromStr>(name: &str, value: Option<String>, default: &str) -> T
where
    T::Err: std::fmt::Display,
{
    let raw = value.unwrap_or_else(|| default.to_string());
    match raw.parse() {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(%name, %raw, %error, "unparseable value, using default");
            default
                .parse()
                .unwrap_or_else(|_| panic!("default for {name} must parse"))
        }
    }
}
