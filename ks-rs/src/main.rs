use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use crossterm::style::Stylize;
use tracing_subscriber::EnvFilter;

use knit_script::cli::CliArgs;
use knit_script::config::MACHINE_TYPES;
use knit_script::diag::Diagnostic;
use knit_script::knit_script_to_knitout;

/// Deeply recursive scripts need more than the default main-thread stack.
const COMPILER_STACK_SIZE: usize = 256 * 1024 * 1024;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.list_machines {
        for m in MACHINE_TYPES {
            println!(
                "{:<10} needles {:>3}  carriers {:>2}  max rack {:>2}  gauge {}",
                m.name, m.bed_width, m.max_carriers, m.max_rack, m.gauge
            );
        }
        return ExitCode::SUCCESS;
    }

    // ── Logging: RUST_LOG wins over -v ───────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let (Some(input), Some(output)) = (args.input.clone(), args.output_path()) else {
        eprintln!("knit-script: no input file");
        return ExitCode::FAILURE;
    };
    let options = args.compile_options();

    let worker = std::thread::Builder::new()
        .name("compiler".into())
        .stack_size(COMPILER_STACK_SIZE)
        .spawn({
            let (input, output) = (input.clone(), output.clone());
            move || knit_script_to_knitout(&input, &output, &options)
        });
    let outcome = match worker.map(|h| h.join()) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => {
            eprintln!("knit-script: compiler thread panicked");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("knit-script: cannot start compiler thread: {e}");
            return ExitCode::FAILURE;
        }
    };

    for line in &outcome.output {
        println!("{line}");
    }
    if outcome.success {
        tracing::info!(output = %output.display(), "wrote knitout");
        return ExitCode::SUCCESS;
    }

    let source = std::fs::read_to_string(&input).unwrap_or_default();
    let path = input.display().to_string();
    let colour = std::io::stderr().is_terminal();
    for d in &outcome.diagnostics {
        eprint!("{}", styled(d, &path, &source, colour));
    }
    ExitCode::FAILURE
}

/// Render a diagnostic, with a red headline on a terminal.
fn styled(d: &Diagnostic, path: &str, source: &str, colour: bool) -> String {
    let text = d.render(path, source);
    if !colour {
        return text;
    }
    match text.split_once('\n') {
        Some((head, rest)) => format!("{}\n{rest}", head.red().bold()),
        None => text.red().bold().to_string(),
    }
}
