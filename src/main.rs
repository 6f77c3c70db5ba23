use anyhow::Result;
use log::error;

use inverter_link::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::new();

    if let Err(e) = inverter_link::run(options).await {
        error!("Application error: {:#}", e);
        eprintln!("inverter-link: {:#}", e);
        std::process::exit(255);
    }

    Ok(())
}
