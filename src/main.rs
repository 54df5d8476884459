use anyhow::Result;

use slotbatch::demo::{self, DemoConfig};

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = DemoConfig::from_args(std::env::args().skip(1));
    pollster::block_on(demo::run(config))?;

    Ok(())
}
