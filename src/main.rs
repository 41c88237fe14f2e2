use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;
use std::time::Duration;

use ppob_backend::{
    config::Config,
    external::{KmspApi, RemoteService},
    flow::Dispatcher,
    handlers,
    store::{InMemoryLedger, LedgerStore},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration file: {e}"))?;

    // The reference ledger is in-memory; a SQL-backed store plugs into the
    // same LedgerStore trait.
    let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedger::new());
    let remote: Arc<dyn RemoteService> = Arc::new(KmspApi::new(config.kmsp.clone())?);

    let dispatcher = Dispatcher::new(store, remote, config.kmsp.payment_method.clone());

    // Background idle-session sweep: sessions quiet for longer than the
    // configured window are cleared, same effect as explicit cancellation.
    {
        let registry = dispatcher.registry().clone();
        let idle_timeout = Duration::from_secs(config.session.idle_timeout_secs);
        let sweep_interval = Duration::from_secs(config.session.sweep_interval_secs);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(sweep_interval).await;
                for key in registry.sweep_idle(idle_timeout) {
                    log::info!(
                        "Session for user {} in chat {} expired after inactivity",
                        key.user_id,
                        key.chat_id
                    );
                }
            }
        });
    }

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let server_config = config.server.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(dispatcher.clone()))
            .service(web::scope("/api/v1").configure(handlers::action_config))
    })
    .bind((server_config.host.as_str(), server_config.port))?
    .run()
    .await?;

    Ok(())
}
