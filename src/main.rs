use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    no_audio: bool,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    sanyatify::app::run(sanyatify::app::AppStartupOptions {
        config_path: args.config,
        no_audio: args.no_audio,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--no-audio" => out.no_audio = true,
            "--config" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--config requires a file path");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--config cannot be empty");
                }
                out.config = Some(PathBuf::from(value.trim()));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("Sanyatify");
    println!("  --config <file>   Playlist file to load");
    println!("  --no-audio        Run without an audio output device");
}
