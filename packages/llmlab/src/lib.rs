//! Command-line front end: resolves configuration, applies the authorization
//! gate and wires each subcommand to the probe, backend control and room
//! reset packages.

pub mod cli;
mod render;
