use chat_server::config::ServerConfig;

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = chat_server::run(config).await {
        eprintln!("server exited with error: {e}");
        std::process::exit(1);
    }
}
