use std::{net::SocketAddr, sync::Arc};

use aegis_game::{accounts::AccountService, realms::RealmList};
use aegis_mysql_auth::{MySQLAccountService, MySQLRealmList};
use anyhow::Result;
use async_std::{net::TcpListener, prelude::*, task};
use conf::AuthServerConfig;
use human_panic::setup_panic;
use opt::{AccountCommand, Opt, OptCommand};
use sessions::SessionRegistry;
use sqlx::mysql::MySqlPoolOptions;
use structopt::StructOpt;
use tracing::{error, info, instrument};

mod conf;
mod connection;
mod opt;
mod protocol;
mod sessions;
mod state_machine;
mod uplink;

/// Everything a connection or uplink handler needs, shared across the
/// accept loops.
pub struct LoginServices<A, R> {
    pub accounts: A,
    pub realms: R,
    pub sessions: SessionRegistry,
}

fn main() -> Result<()> {
    setup_panic!();
    tracing_subscriber::fmt::init();

    let opts = Opt::from_args();

    match opts.command {
        OptCommand::Init => {
            AuthServerConfig::default().write(&opts.config)?;
            println!("wrote config to {}", opts.config.display());
            Ok(())
        }
        OptCommand::Account { command } => task::block_on(run_account_command(&opts, command)),
        OptCommand::Run => task::block_on(run_server(&opts)),
    }
}

async fn run_account_command(opts: &Opt, command: AccountCommand) -> Result<()> {
    let config = AuthServerConfig::read(&opts.config)?;
    let pool = MySqlPoolOptions::new()
        .connect(&config.login_database)
        .await?;
    let accounts = MySQLAccountService::new(pool);

    match command {
        AccountCommand::Create {
            username,
            password,
            email,
        } => match accounts.create_account(&username, &password, &email).await {
            Ok(id) => println!("created account {id}"),
            Err(e) => error!("failed to create account: {e}"),
        },
        AccountCommand::Delete { id } => {
            match accounts
                .delete_account(aegis_game::accounts::AccountId(id))
                .await
            {
                Ok(()) => println!("deleted account {id}"),
                Err(e) => error!("failed to delete account: {e}"),
            }
        }
    }

    Ok(())
}

#[instrument(skip(opts))]
async fn run_server(opts: &Opt) -> Result<()> {
    let config = AuthServerConfig::read(&opts.config)?;

    let pool = MySqlPoolOptions::new()
        .connect(&config.login_database)
        .await?;
    let services = Arc::new(LoginServices {
        accounts: MySQLAccountService::new(pool.clone()),
        realms: MySQLRealmList::new(pool, std::time::Duration::from_secs(15)),
        sessions: SessionRegistry::new(),
    });

    // recovery: a login service that crashed mid-session left stale
    // "online" rows behind; nothing has registered on this uplink yet.
    if let Err(e) = services.realms.set_all_offline().await {
        error!("failed to mark realms offline on startup: {e}");
    }

    let client_addr = SocketAddr::from((config.bind_address, config.port));
    let uplink_addr = SocketAddr::from((config.bind_address, config.realm_uplink_port));

    let client_loop = accept_clients(client_addr, services.clone());
    let uplink_loop = uplink::start(uplink_addr, services);

    client_loop.try_join(uplink_loop).await.map(|_| ())
}

async fn accept_clients<A, R>(
    addr: SocketAddr,
    services: Arc<LoginServices<A, R>>,
) -> Result<()>
where
    A: AccountService + Send + Sync + 'static,
    R: RealmList + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "login service listening for clients");

    let mut incoming = listener.incoming();
    while let Some(stream) = incoming.next().await {
        let stream = stream?;
        let services = services.clone();
        task::spawn(async move {
            if let Err(e) = connection::handle_connection(stream, &services).await {
                error!("connection ended with error: {e}");
            }
        });
    }

    Ok(())
}
