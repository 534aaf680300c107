use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    config_dir: Option<PathBuf>,
    media_dir: Option<PathBuf>,
    precache: bool,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    let options = nitnem::app::AppStartupOptions {
        config_dir: args.config_dir,
        media_dir: args.media_dir,
    };

    if args.precache {
        return nitnem::app::run_precache(options);
    }
    nitnem::app::run_with_startup(options)
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--config-dir" => {
                index += 1;
                out.config_dir = Some(path_value(&args, index, "--config-dir")?);
            }
            "--media-dir" => {
                index += 1;
                out.media_dir = Some(path_value(&args, index, "--media-dir")?);
            }
            "--precache" => out.precache = true,
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

fn path_value(args: &[String], index: usize, flag: &str) -> anyhow::Result<PathBuf> {
    let Some(value) = args.get(index) else {
        anyhow::bail!("{flag} requires a path");
    };
    if value.trim().is_empty() {
        anyhow::bail!("{flag} cannot be empty");
    }
    Ok(PathBuf::from(value.trim()))
}

fn print_help() {
    println!("Nitnem");
    println!("  --config-dir <path>  Use <path> instead of ~/.config/nitnem");
    println!("  --media-dir <path>   Play audio files from <path>");
    println!("  --precache           Fill the offline cache and exit");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_paths_and_precache() {
        let parsed = parse_args(args(&["--config-dir", "/tmp/n", "--precache"])).expect("parse");
        assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/n")));
        assert!(parsed.precache);
        assert_eq!(parsed.media_dir, None);
    }

    #[test]
    fn rejects_unknown_and_missing_values() {
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert!(parse_args(args(&["--media-dir"])).is_err());
        assert!(parse_args(args(&["--media-dir", " "])).is_err());
    }
}
