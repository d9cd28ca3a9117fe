use anyhow::Context;
use smuggler_importer::{Importer, init_logger};
use smuggler_kernel::{Settings, load_config};

fn main() -> anyhow::Result<()> {
    let settings: Settings =
        load_config(Some("smuggler")).context("Critical: Configuration is malformed")?;

    let _log = init_logger(&settings.logging)?;

    Importer::builder().settings(settings).build()?.run()?;
    Ok(())
}
