fn main() -> anyhow::Result<()> {
    audio_detect_cli::run()
}
