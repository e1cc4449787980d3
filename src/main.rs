use smartmeter2http::{
    api::{commands::CommandRegistry, ApiManager, ApiState},
    config::Config,
    metering_d0::{serial::{open_serial, SerialSettings}, D0Manager, D0Reader},
    metering_s0::{gpio::{EdgeSource, SysfsGpioEdgeSource}, S0Interface},
    SharedReadingStore,
};
use tokio::task::JoinHandle;
use std::{sync::Arc, time::Duration};
use log::{error, info};


#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    let default_filter = std::env::var("SM_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    info!("Starting (PID={})", std::process::id());

    let config = Config::load().map_err(|e| {
        error!("{}", e);
        std::io::Error::other(e.to_string())
    })?;

    let store = Arc::new(SharedReadingStore::new());
    let mut commands = CommandRegistry::new();
    let mut threads: Vec<JoinHandle<()>> = Vec::new();
    let mut registration = None;
    let mut d0_abort = None;

    // Start the D0 reader if configured
    if let Some(d0) = config.d0_enabled() {
        let settings = SerialSettings::d0(d0.serial_port.clone());
        let port = open_serial(&settings).map_err(|e| {
            error!("{}", e);
            std::io::Error::other(e.to_string())
        })?;

        let mut manager = D0Manager::new(
            D0Reader::new(port, settings.byte_timeout),
            store.clone(),
            d0.section.clone(),
            Duration::from_secs(d0.read_interval),
            Duration::from_secs(d0.invocation_timeout),
        );
        d0_abort = Some(manager.abort_flag());
        threads.push(tokio::spawn(async move {
            let _ = manager.start_thread().await;
        }));
    }

    // Count S0 pulses if configured
    if let Some(s0) = config.s0_enabled() {
        let counter = S0Interface::new(s0.section.clone(), store.clone()).map_err(|e| {
            error!("{}", e);
            std::io::Error::other(e.to_string())
        })?;

        let mut source = SysfsGpioEdgeSource::new(
            s0.pin,
            Duration::from_millis(s0.debounce_ms),
            Duration::from_millis(s0.poll_interval_ms),
        );
        match source.register(counter.edge_handler()) {
            Ok(r) => registration = Some(r),
            Err(e) => {
                error!("{}", e);
                for task in threads.iter() {
                    task.abort();
                }
                return Err(std::io::Error::other(e.to_string()));
            }
        }

        // Setting the counter from the meter display is done via /cmd?name=s0Interface.setValue&value=<COUNT>
        commands.register_s0(counter);
    }

    /* Run our api gateway now */
    info!("Commands available: {:?}", commands.names());
    if config.httpd.enabled {
        let api = ApiManager::new(ApiState::new(store.clone(), commands));
        let port = config.httpd.port;
        threads.push(tokio::spawn(async move {
            if let Err(e) = api.start_thread(port).await {
                error!("HTTP API failed: {}", e);
            }
        }));
    } else {
        info!("HTTP API disabled, readings are only kept in memory");
    }

    info!("All modules started, now waiting for a signal to exit");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Signal received, shutting down");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(10)) => {}
        }

        if threads.iter().any(|task| task.is_finished()) {
            break;
        }
    }

    if let Some(abort) = d0_abort {
        abort.abort();
    }
    for task in threads.iter() {
        task.abort();
    }

    if let Some(registration) = registration {
        registration.detach();
    }

    info!("Stopped (PID={})", std::process::id());
    Ok(())
}
