//! Petitio Calculator CLI
//!
//! Command-line front end for monetary correction, interest and fee
//! calculations

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::Serialize;

use petitio_calculator::config::LiveSource;
use petitio_calculator::format::{format_brl, format_percent};
use petitio_calculator::{
    CalculationBreakdown, Calculator, CompleteRequest, ProviderConfig, Provenance, RateIndexProvider,
};

#[derive(Parser, Debug)]
#[command(name = "petitio-calc", version, about = "Monetary correction and interest calculator")]
struct Cli {
    #[command(flatten)]
    rates: RateArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct RateArgs {
    /// JSON endpoint serving current index rates
    #[arg(long, global = true)]
    rates_url: Option<String>,

    /// Query Banco Central SGS for current index rates
    #[arg(long, global = true)]
    bcb: bool,

    /// CSV (index,rate) overriding the built-in fallback rates
    #[arg(long, global = true)]
    fallback_csv: Option<PathBuf>,

    /// Seconds to wait for live rates before using estimates
    #[arg(long, global = true)]
    wait_secs: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the monthly rate of every index
    Rates,

    /// Correct a value by an index between two dates
    Correct {
        #[arg(long)]
        value: f64,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, default_value = "ipca")]
        index: String,
    },

    /// Interest on a base value over a number of months
    Interest {
        #[arg(long)]
        base: f64,
        #[arg(long)]
        months: f64,
        #[arg(long, default_value = "simple-1%")]
        basis: String,
    },

    /// Attorney fee on a basis value
    Fee {
        #[arg(long)]
        basis_value: f64,
        #[arg(long, default_value = "contractual")]
        category: String,
        #[arg(long)]
        percentage: Option<f64>,
        #[arg(long)]
        flat: Option<f64>,
    },

    /// Correction plus optional interest
    Complete {
        #[arg(long)]
        value: f64,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, default_value = "ipca")]
        index: String,
        /// Add late-payment interest on the corrected value
        #[arg(long)]
        interest: bool,
        #[arg(long, default_value = "simple-1%")]
        basis: String,
        /// Print the breakdown as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a CSV of requests (value,start_date,end_date,index,apply_interest,interest_basis)
    Batch {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "calculation_output.csv")]
        output: PathBuf,
    },
}

/// One output row of a batch run
#[derive(Debug, Serialize)]
struct BatchRow {
    row: usize,
    value: f64,
    index: String,
    provenance: String,
    months: f64,
    factor: f64,
    corrected_value: f64,
    interest: f64,
    total: f64,
    percent_uplift: f64,
    error: String,
}

fn provider_config(args: &RateArgs) -> ProviderConfig {
    let mut config = ProviderConfig::from_env();
    if let Some(url) = &args.rates_url {
        config.live_source = LiveSource::Endpoint(url.clone());
    } else if args.bcb {
        config.live_source = LiveSource::BancoCentral;
    }
    if let Some(path) = &args.fallback_csv {
        config.fallback_csv = Some(path.clone());
    }
    if let Some(secs) = args.wait_secs.filter(|s| s.is_finite() && *s >= 0.0) {
        config.wait_timeout = Duration::from_secs_f64(secs);
    }
    config
}

fn provenance_label(provenance: Provenance) -> &'static str {
    match provenance {
        Provenance::Live => "live",
        Provenance::Estimated => "estimated",
    }
}

fn print_breakdown(result: &CalculationBreakdown) {
    let correction = &result.correction;
    println!("Period: {} to {} ({:.4} months, {} days)",
        result.period.start, result.period.end, result.period.months, result.period.days);
    println!("Index: {} at {:.4}%/month ({})",
        correction.index.to_uppercase(), correction.monthly_rate, provenance_label(correction.provenance));
    println!();
    println!("  Original value:   {:>18}", format_brl(correction.original_value));
    println!("  Factor:           {:>18.6}", correction.factor);
    println!("  Correction:       {:>18}", format_brl(correction.correction_amount));
    println!("  Corrected value:  {:>18}", format_brl(correction.corrected_value));

    if let Some(interest) = &result.interest {
        println!("  Interest ({}):{:>13}", interest.basis.name(), format_brl(interest.interest_amount));
    } else if result.interest_included_in_index {
        println!("  Interest:         {:>18}", "included in index");
    }

    println!("  Total:            {:>18}", format_brl(result.total));
    println!("  Uplift:           {:>18}", format_percent(result.percent_uplift));
}

fn run_batch(calculator: &Calculator, input: &Path, output: &Path) -> Result<()> {
    let start = Instant::now();
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let mut reader = csv::Reader::from_reader(file);

    let requests: Vec<CompleteRequest> = reader
        .deserialize::<CompleteRequest>()
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("reading requests from {}", input.display()))?;
    println!("Loaded {} requests in {:?}", requests.len(), start.elapsed());

    let results = calculator.calculate_batch(&requests);

    let mut writer = csv::Writer::from_path(output).with_context(|| format!("creating {}", output.display()))?;
    let mut failures = 0;
    for (i, (request, result)) in requests.iter().zip(&results).enumerate() {
        let row = match result {
            Ok(b) => BatchRow {
                row: i + 1,
                value: request.value,
                index: b.correction.index.clone(),
                provenance: provenance_label(b.correction.provenance).to_string(),
                months: b.period.months,
                factor: b.correction.factor,
                corrected_value: b.correction.corrected_value,
                interest: b.interest_amount(),
                total: b.total,
                percent_uplift: b.percent_uplift,
                error: String::new(),
            },
            Err(e) => {
                failures += 1;
                BatchRow {
                    row: i + 1,
                    value: request.value,
                    index: request.index.clone(),
                    provenance: String::new(),
                    months: 0.0,
                    factor: 0.0,
                    corrected_value: 0.0,
                    interest: 0.0,
                    total: 0.0,
                    percent_uplift: 0.0,
                    error: e.to_string(),
                }
            }
        };
        writer.serialize(row)?;
    }
    writer.flush()?;

    println!("Calculated {} requests ({} rejected) in {:?}", results.len(), failures, start.elapsed());
    println!("Results written to: {}", output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = provider_config(&cli.rates);

    let provider: Arc<RateIndexProvider> = Arc::new(config.build_provider()?);
    provider.start_refresh();
    let calculator = Calculator::new(Arc::clone(&provider)).with_wait_timeout(config.wait_timeout);

    // Commands needing rates get a bounded wait on the live fetch
    let needs_rates = !matches!(cli.command, Command::Interest { .. } | Command::Fee { .. });
    if needs_rates && !provider.wait_ready(config.wait_timeout).await {
        info!("Live rates not available after {:?}, using estimates", config.wait_timeout);
    }

    match cli.command {
        Command::Rates => {
            println!("{:<8} {:>12} {:>10}", "Index", "Rate/month", "Source");
            println!("{}", "-".repeat(32));
            for rate in provider.snapshot() {
                println!("{:<8} {:>11.4}% {:>10}", rate.name, rate.rate, provenance_label(rate.provenance));
            }
        }

        Command::Correct { value, start, end, index } => {
            let result = calculator.correct(value, Some(start), Some(end), &index)?;
            println!("Index: {} at {:.4}%/month ({})",
                result.index.to_uppercase(), result.monthly_rate, provenance_label(result.provenance));
            println!("  Months:           {:>18.4}", result.months);
            println!("  Factor:           {:>18.6}", result.factor);
            println!("  Correction:       {:>18}", format_brl(result.correction_amount));
            println!("  Corrected value:  {:>18}", format_brl(result.corrected_value));
        }

        Command::Interest { base, months, basis } => {
            let result = calculator.interest(base, months, &basis);
            println!("Basis: {} ({:.2}%/month, {})",
                result.basis.name(), result.monthly_rate * 100.0, if result.compound { "compound" } else { "simple" });
            println!("  Interest:         {:>18}", format_brl(result.interest_amount));
            println!("  Total:            {:>18}", format_brl(result.base_value + result.interest_amount));
        }

        Command::Fee { basis_value, category, percentage, flat } => {
            let result = calculator.fee(basis_value, &category, percentage, flat);
            let category = result.category.map(|c| c.name()).unwrap_or("default");
            match result.percentage {
                Some(pct) => println!("Category: {} ({:.2}%)", category, pct),
                None => println!("Category: {}", category),
            }
            println!("  Fee:              {:>18}", format_brl(result.fee_amount));
        }

        Command::Complete { value, start, end, index, interest, basis, json } => {
            let request = CompleteRequest {
                value,
                start_date: Some(start.to_string()),
                end_date: Some(end.to_string()),
                index,
                apply_interest: interest,
                interest_basis: basis,
            };
            let result = calculator.calculate_request(&request)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_breakdown(&result);
            }
        }

        Command::Batch { input, output } => run_batch(&calculator, &input, &output)?,
    }

    Ok(())
}
