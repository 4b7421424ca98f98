use log::{error, warn};
use redesk::settings::Settings;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match redesk::settings_path() {
        Ok(path) => {
            let settings = Settings::load(&path);
            if !path.exists() {
                // First run: write the defaults out so they can be edited.
                if let Err(e) = settings.save(&path) {
                    warn!("could not write default settings: {}", e);
                }
            }
            settings
        }
        Err(e) => {
            warn!("{}, using default settings", e);
            Settings::default()
        }
    };

    if let Err(e) = redesk::run(settings) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
