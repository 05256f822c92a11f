//! opt
//!
//! Command-line surface: run the realm server, or generate a fresh
//! config file.

use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
pub struct Opt {
    #[structopt(default_value = "config.yaml", long)]
    pub config: PathBuf,

    #[structopt(subcommand)]
    pub command: OptCommand,
}

#[derive(StructOpt, Debug)]
pub enum OptCommand {
    /// Run the realm server.
    Run,
    /// Generate a new config file at the path given by `--config`.
    Init,
}
