mod error;
mod config;
mod core {
    pub mod assembler;
    pub mod defaults;
    pub mod model;
    pub mod selection;
    pub mod store;
}
mod ai {
    pub mod client;
}
mod persistence {
    pub mod local;
}
mod sync {
    pub mod coordinator;
    pub mod remote;
}
mod session;
mod console;

use config::Settings;
use console::Console;
use dotenv::dotenv;
use session::Session;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env();
    log::debug!("Settings: {settings:?}");

    let session = Session::start(&settings).await;
    Console::new(session).run().await?;

    Ok(())
}
