use std::{net::SocketAddr, sync::Arc, time::Duration};

use aegis_mysql_characters::{MySQLCharacterService, MySQLGroupService, MySQLSocialService};
use anyhow::Result;
use async_std::{net::TcpListener, prelude::*, task};
use conf::WorldServerConfig;
use human_panic::setup_panic;
use login_uplink::{LoginUplink, RealmIdentity};
use opt::{Opt, OptCommand};
use session::{SessionServices, MAX_CHARACTERS_PER_ACCOUNT};
use sqlx::mysql::MySqlPoolOptions;
use structopt::StructOpt;
use tracing::{error, info, instrument};

mod char_create;
mod chat;
mod conf;
mod login_uplink;
mod nodes;
mod opt;
mod protocol;
mod proxy;
mod registry;
mod session;
mod state_machine;

fn main() -> Result<()> {
    setup_panic!();
    tracing_subscriber::fmt::init();

    let opts = Opt::from_args();

    match opts.command {
        OptCommand::Init => {
            WorldServerConfig::default().write(&opts.config)?;
            println!("wrote config to {}", opts.config.display());
            Ok(())
        }
        OptCommand::Run => task::block_on(run_server(&opts)),
    }
}

#[instrument(skip(opts))]
async fn run_server(opts: &Opt) -> Result<()> {
    let config = WorldServerConfig::read(&opts.config)?;

    let pool = MySqlPoolOptions::new()
        .connect(&config.character_database)
        .await?;
    let characters = Arc::new(MySQLCharacterService::new(
        pool.clone(),
        MAX_CHARACTERS_PER_ACCOUNT,
    ));
    let groups = Arc::new(MySQLGroupService::new(pool.clone()));
    let social = Arc::new(MySQLSocialService::new(pool));

    let sessions = Arc::new(registry::SessionRegistry::new());
    let nodes = Arc::new(nodes::WorldNodes::new(
        config.visible_name.clone(),
        sessions.clone(),
        characters.clone(),
    ));

    // register with the login service; without it no client can ever
    // prove a session key, so failing here fails the whole realm
    let login_uplink = Arc::new(
        LoginUplink::connect(
            &config.login_uplink_address,
            &RealmIdentity {
                id: config.realm_id,
                internal_name: config.internal_name.clone(),
                shared_secret: config.shared_secret,
                visible_name: config.visible_name.clone(),
                host: config.external_address.clone(),
                port: config.port,
            },
        )
        .await?,
    );
    task::spawn(login_uplink.clone().run_keep_alive());

    let services = SessionServices {
        characters,
        groups,
        social,
        login_uplink,
        sessions,
        nodes: nodes.clone(),
        realm_id: config.realm_id,
        realm_name: config.visible_name.clone(),
        motd: config.motd.clone(),
        player_capacity: config.player_capacity,
        idle_timeout: Duration::from_secs(config.session_idle_timeout_secs),
        transfer_timeout: Duration::from_secs(config.transfer_timeout_secs),
    };

    let client_addr = SocketAddr::from((config.bind_address, config.port));
    let node_addr = SocketAddr::from((config.bind_address, config.world_node_port));

    let client_loop = accept_clients(client_addr, services);
    let node_loop = nodes::listen(node_addr, nodes);

    client_loop.try_join(node_loop).await.map(|_| ())
}

async fn accept_clients(addr: SocketAddr, services: SessionServices) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "realm service listening for clients");

    let mut incoming = listener.incoming();
    while let Some(stream) = incoming.next().await {
        let stream = stream?;
        let services = services.clone();
        task::spawn(async move {
            if let Err(e) = session::handle_connection(stream, services).await {
                error!("connection ended with error: {e}");
            }
        });
    }

    Ok(())
}
