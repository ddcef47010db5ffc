use anyhow::Context;
use tracing::error;

use dropfill::cli::Cli;
use dropfill::config::Config;
use dropfill::pipeline;
use dropfill::store::MetadataStore;


fn init_logging(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}


fn main() {
    let args = <Cli as clap::Parser>::parse();

    init_logging(args.json_log);

    let config = match Config::read(&args.config)
        .with_context(|| format!("failed to read config from '{}'", args.config))
    {
        Ok(config) => config,
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&args, &config) {
        error!("{:#}", err);
        std::process::exit(dropfill::error::exit_code(&err));
    }
}


fn run(args: &Cli, config: &Config) -> anyhow::Result<()> {
    let store = MetadataStore::open(&args.database).context("failed to open the database")?;
    let use_cache = config.general.use_cache && !args.no_cache;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(pipeline::run(config, &store, use_cache))
}
