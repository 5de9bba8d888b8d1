use open_meteo_mqtt::daemon::Daemon;

use open_meteo_mqtt::configuration;

const DEFAULT_CONFIG_PATH: &str = "/etc/open-meteo-mqtt.yaml";

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => path.as_str(),
        None => DEFAULT_CONFIG_PATH,
    };

    let config = match configuration::Configuration::load(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{config_path}: {err}");
            std::process::exit(1);
        }
    };

    stderrlog::new()
        .module(module_path!())
        .verbosity(config.log_verbosity)
        .init()
        .expect("Failed to initialize logging");

    Daemon::new(config).run().await;
}
