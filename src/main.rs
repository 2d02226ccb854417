#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = lessonforge::run().await {
        eprintln!("lessonforge fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
