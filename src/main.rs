use priceoptima::config::Config;
use priceoptima::shell;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let result = match Config::from_env() {
        Ok(config) => shell::run(config).await,
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}
