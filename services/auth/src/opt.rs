//! opt
//!
//! Command-line surface: run the server, create/delete accounts, or
//! generate a fresh config file.

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
    /// Run the login server.
    Run,
    /// Manage accounts directly, without starting the server.
    Account {
        #[structopt(subcommand)]
        command: AccountCommand,
    },
    /// Generate a new config file at the path given by `--config`.
    Init,
}

#[derive(StructOpt, Debug)]
pub enum AccountCommand {
    /// Create a new account.
    Create {
        username: String,
        password: String,
        email: String,
    },
    /// Delete an account by id.
    Delete { id: u32 },
}
