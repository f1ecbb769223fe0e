use {
    anyhow::Result,
    clap::Parser,
    ohlc_feed::{Cli, init_logging, run},
    std::panic,
};

// Single-threaded runtime: every request is awaited before the next one is built.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(&args.log_config())?;

    panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        log::error!("CRITICAL PANIC:\n{}\nStack Trace:\n{}", info, backtrace);
    }));

    run(args).await
}
