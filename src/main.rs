use treepass::bot;

fn main() {
    bot::init_tracing();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to build Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(bot::run()) {
        tracing::error!("bot exited with error: {}", e);
        eprintln!("Error starting bot: {}", e);
        std::process::exit(1);
    }
}
