use clap::Parser;
use log::LevelFilter;
use reclens::cli::Cli;
use reclens::export::{export_csv_archive, export_sqlite};
use reclens::output::PrettyPrinter;
use reclens::run::ReconRun;
use reclens::RunConfig;

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    if let Err(error) = run(&cli) {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> reclens::Result<()> {
    let run_name = cli.effective_run_name();
    std::fs::create_dir_all(&cli.output_dir)?;

    let config = RunConfig::from_file(&cli.config)?;
    let mut run = ReconRun::new(&run_name, config);
    let execution = run.execute(cli.continue_on_error);

    PrettyPrinter::print_run_summary(run.run_name(), run.outcomes().values());
    execution?;

    for (entity, outcome) in run.outcomes() {
        if !outcome.success {
            continue;
        }
        if let Some(result) = run.entity_result(entity) {
            PrettyPrinter::print_field_summaries(entity, &result.field_summaries);
        }
    }

    let tables = run.result_tables();
    if cli.export_sqlite {
        let db_path = cli.output_dir.join(format!("{}.sqlite", run_name));
        export_sqlite(
            &tables,
            &db_path,
            cli.export_mismatches_only,
            cli.export_sampling_threshold,
        )?;
        println!("💾 SQLite results: {}", db_path.display());
    }
    if cli.export_csv {
        let archive_path = cli.output_dir.join(format!("{}.tar.zst", run_name));
        export_csv_archive(&tables, &archive_path, cli.export_mismatches_only)?;
        println!("📦 CSV archive: {}", archive_path.display());
    }

    Ok(())
}
