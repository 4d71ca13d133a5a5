use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    mute: bool,
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    loadscreen::app::run_with_startup(loadscreen::app::AppStartupOptions {
        config_path: args.config,
        force_mute: args.mute,
        debug: args.debug,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
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
            "--mute" => out.mute = true,
            "--debug" => out.debug = true,
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
    println!("loadscreen");
    println!("  --config <file>   Overlay config (default: ~/.config/loadscreen/overlay.json)");
    println!("  --mute            Start muted");
    println!("  --debug           Debug logging (RUST_LOG honoured)");
    println!();
    println!("Pipe loader messages as JSON lines on stdin, e.g.");
    println!("  {{\"eventName\":\"loadProgress\",\"loadFraction\":0.5}}");
    println!("Keys: space play/pause, arrows track/volume, m mute, q/esc quit");
}
