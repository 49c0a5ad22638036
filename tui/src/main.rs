use color_eyre::eyre::Result;
use opsdeck_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = Config::load()?;
    opsdeck_tui::run_main(config).await
}
