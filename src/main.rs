use handsign::{cli, logging};

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
