mod config;
#[cfg(unix)]
mod consent_flow;
#[cfg(unix)]
mod harness;
mod wire;
