use clap::Parser;

fn main() {
    let args = wiztest::cli::Args::parse();
    let config = match wiztest::cli::validate(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    match wiztest::run(&config) {
        Ok(tally) if tally.failed == 0 => {}
        Ok(_) => std::process::exit(1),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
