use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const HOSTMON_PORT: &str = "HOSTMON_PORT";

const DEFAULT_PORT: u16 = 5962;

pub fn get_port() -> u16 {
    let port_from_env = std::env::var(HOSTMON_PORT);
    port_from_env.map_or(DEFAULT_PORT, |res| res.parse().unwrap_or(DEFAULT_PORT))
}

const DEFAULT_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0));

pub fn get_default_addr() -> IpAddr {
    DEFAULT_ADDR
}

const HOSTMON_HTTP_ADDR: &str = "HOSTMON_HTTP_ADDR";

/// Address of the HTTP front end, if one is configured in the environment
pub fn get_http_addr() -> Option<SocketAddr> {
    let addr_from_env = std::env::var(HOSTMON_HTTP_ADDR);
    addr_from_env.ok().and_then(|res| res.parse().ok())
}
