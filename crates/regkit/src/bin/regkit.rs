use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ops = regkit::cli::Regkit::parse();
    if std::env::var_os("RUST_LOG").is_some() {
        regkit_trace::init_fmt(ops.structured).ok();
    }

    ops.run().await
}
