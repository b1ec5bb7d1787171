fn main() -> anyhow::Result<()> {
    formplayer_cli::cli::main()
}
