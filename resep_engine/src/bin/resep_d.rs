// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use clap::Parser;

#[derive(Debug, clap::Parser)]
#[command(long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = String::from("resep.toml"))]
    config_file: String,
    /// Write default settings, workflow and input profile, then quit.
    #[arg(short, long, default_value_t = String::from(""))]
    template: String,
    /// Workflow to execute, overriding the settings.
    #[arg(short, long, default_value_t = String::from(""))]
    workflow: String,
    /// Input profile, overriding the settings.
    #[arg(short, long, default_value_t = String::from(""))]
    profile: String,
    /// Configuration selected at start, instead of the first one.
    #[arg(long, default_value_t = String::from(""))]
    configuration: String,
    /// Print the report of an existing results file and quit.
    #[arg(long, default_value_t = String::from(""))]
    report: String,
    /// Print the entries of an existing log file and quit.
    #[arg(long, default_value_t = String::from(""))]
    show_log: String,
    /// First day of the log entries shown, as yyyy-MM-dd.
    #[arg(long, default_value_t = String::from(""))]
    from: String,
    /// Last day of the log entries shown, as yyyy-MM-dd.
    #[arg(long, default_value_t = String::from(""))]
    to: String,
    /// Only show log entries containing this text.
    #[arg(long, default_value_t = String::from(""))]
    filter: String,
    /// Read commands from the standard input during the run.
    #[arg(short, long, default_value_t = false)]
    interactive: bool,
    /// Copy the results file to this path after the run.
    #[arg(long, default_value_t = String::from(""))]
    export: String,
    /// List the input profiles available and quit.
    #[arg(long, default_value_t = false)]
    list_profiles: bool,
    #[arg(long, default_value_t = false)]
    output_json: bool,
}

fn read_conf_from_file(filename: &str) -> anyhow::Result<resep_engine::ResepSettings> {
    Ok(toml::from_str::<resep_engine::ResepSettings>(&std::fs::read_to_string(filename)?)?)
}

fn print_report(results_file: &str, output_json: bool) -> anyhow::Result<()> {
    let results = resep_telemetry::read_all(results_file)?;
    if results.skipped > 0 {
        log::warn!("{} malformed rows skipped in {}", results.skipped, results_file);
    }
    let report = resep_telemetry::report::RunReport::from_rows(&results.rows);
    if output_json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    // Create the templates and exit.
    if !args.template.is_empty() {
        resep_engine::create_templates(&args.template)?;
        return Ok(());
    }

    // Print the report of a past run and exit.
    if !args.report.is_empty() {
        return print_report(&args.report, args.output_json);
    }

    // Print the log of past runs and exit.
    if !args.show_log.is_empty() {
        let log_file = resep_telemetry::read_log(&args.show_log)?;
        let filter = resep_telemetry::log_filter::LogFilter::new(&args.from, &args.to, &args.filter)?;
        let entries = filter.apply(&log_file.entries);
        if args.output_json {
            let entries = entries
                .iter()
                .map(|x| serde_json::json!({ "time": x.formatted_time(), "title": x.title, "message": x.message }))
                .collect::<Vec<serde_json::Value>>();
            println!("{}", serde_json::to_string(&entries)?);
        } else {
            for entry in entries {
                println!("{} [{}] {}", entry.formatted_time(), entry.title, entry.message);
            }
        }
        return Ok(());
    }

    let mut conf = read_conf_from_file(&args.config_file)?;

    // Print the input profiles available and exit.
    if args.list_profiles {
        let profiles = resep_profile::list_profiles(&conf.general.profiles_dir)?;
        let profiles = profiles.iter().map(|x| x.display().to_string()).collect::<Vec<String>>();
        if args.output_json {
            println!("{}", serde_json::to_string(&profiles)?);
        } else {
            for profile in profiles {
                println!("{}", profile);
            }
        }
        return Ok(());
    }

    if !args.workflow.is_empty() {
        conf.general.workflow = args.workflow.clone();
    }
    if !args.profile.is_empty() {
        conf.general.input_profile = args.profile.clone();
    }
    if args.interactive {
        conf.general.interactive = true;
    }
    let results_file = conf.general.results_file.clone();

    let async_runtime = tokio::runtime::Builder::new_multi_thread().worker_threads(8).enable_all().build()?;
    let summary = async_runtime.block_on(resep_engine::resep_main(conf, &args.configuration));
    // do not wait for a pending read of the standard input
    async_runtime.shutdown_background();
    let summary = summary?;
    log::info!(
        "run {}: {} rounds, {} successful, total cost {}",
        summary.state,
        summary.rounds,
        summary.successful_rounds,
        summary.total_cost
    );

    if !args.export.is_empty() {
        let destination = resep_telemetry::export(&results_file, &args.export)?;
        log::info!("results exported to {}", destination.display());
    }
    print_report(&results_file, args.output_json)
}
