use clap::Parser;

use dynu_dns01::cli::Cli;
use dynu_dns01::logging;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let stdout = std::io::stdout();
    cli.execute(&mut stdout.lock())?;
    Ok(())
}
