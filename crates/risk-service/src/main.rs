use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use risk_core::{BusinessId, FinancialInput};
use risk_service::{telemetry, CheckinRequest, PredictionRequest, RiskService, ServiceConfig};
use serde::Serialize;

fn usage() {
    eprintln!("Usage:");
    eprintln!("  risk-service register --name <NAME> --email <EMAIL>");
    eprintln!("  risk-service login --email <EMAIL>");
    eprintln!("  risk-service checkin --business <ID> --sales <N> --expenses <N> [--receivables <N>] [--emi <N>] [--cash <N>] [--date YYYY-MM-DD]");
    eprintln!("  risk-service metrics --business <ID>");
    eprintln!("  risk-service history --business <ID> [--limit <N>]");
    eprintln!("  risk-service window --business <ID> [--as-of YYYY-MM-DD]");
    eprintln!("  risk-service check [FIGURES]");
    eprintln!("  risk-service predict [--business <ID>] [--mode auto|manual|rolling] [--explain] [FIGURES]");
    eprintln!();
    eprintln!("FIGURES: --input '<json object>' or any of --sales --expenses --receivables");
    eprintln!("         --emi --cash --sales-prev --expenses-prev");
}

fn value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn required<'a>(args: &'a [String], flag: &str) -> Result<&'a str> {
    value(args, flag).with_context(|| format!("{} is required", flag))
}

fn number(args: &[String], flag: &str) -> Result<Option<f64>> {
    value(args, flag)
        .map(|raw| {
            raw.parse::<f64>()
                .with_context(|| format!("{} expects a number, got '{}'", flag, raw))
        })
        .transpose()
}

fn date(args: &[String], flag: &str) -> Result<Option<NaiveDate>> {
    value(args, flag)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("{} expects YYYY-MM-DD, got '{}'", flag, raw))
        })
        .transpose()
}

fn business_id(args: &[String]) -> Result<BusinessId> {
    let raw = required(args, "--business")?;
    raw.parse()
        .with_context(|| format!("--business expects an integer id, got '{}'", raw))
}

fn figures(args: &[String]) -> Result<FinancialInput> {
    let base = match value(args, "--input") {
        Some(raw) => {
            let json: serde_json::Value =
                serde_json::from_str(raw).context("--input must be a JSON object")?;
            FinancialInput::from_json(&json)
        }
        None => FinancialInput::default(),
    };
    let flags = FinancialInput {
        monthly_sales: number(args, "--sales")?,
        monthly_expenses: number(args, "--expenses")?,
        receivables: number(args, "--receivables")?,
        loan_emi: number(args, "--emi")?,
        cash_balance: number(args, "--cash")?,
        sales_3_months_ago: number(args, "--sales-prev")?,
        expenses_3_months_ago: number(args, "--expenses-prev")?,
    };
    Ok(flags.or(&base))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(service: &RiskService, command: &str, args: &[String]) -> Result<()> {
    match command {
        "register" => {
            let business = service
                .register(required(args, "--name")?, required(args, "--email")?)
                .await?;
            print_json(&business)
        }
        "login" => match service.login(required(args, "--email")?).await? {
            Some(business) => print_json(&business),
            None => bail!("No business registered with that email"),
        },
        "checkin" => {
            let request = CheckinRequest {
                business_id: business_id(args)?,
                checkin_date: date(args, "--date")?,
                daily_sales: number(args, "--sales")?.context("--sales is required")?,
                daily_expenses: number(args, "--expenses")?.context("--expenses is required")?,
                receivables: number(args, "--receivables")?.unwrap_or(0.0),
                loan_emi: number(args, "--emi")?.unwrap_or(0.0),
                cash_balance: number(args, "--cash")?.unwrap_or(0.0),
            };
            print_json(&service.submit_checkin(&request).await?)
        }
        "metrics" => print_json(&service.metrics(business_id(args)?).await?),
        "history" => {
            let limit = value(args, "--limit")
                .map(|raw| {
                    raw.parse::<usize>()
                        .with_context(|| format!("--limit expects a positive integer, got '{}'", raw))
                })
                .transpose()?;
            print_json(&service.history(business_id(args)?, limit).await?)
        }
        "window" => {
            let window = service
                .rolling_window(business_id(args)?, date(args, "--as-of")?)
                .await?;
            print_json(&window)
        }
        "check" => print_json(&service.check_input(&figures(args)?)),
        "predict" => {
            let business_id = match value(args, "--business") {
                Some(_) => Some(business_id(args)?),
                None => None,
            };
            let request = PredictionRequest {
                business_id,
                figures: figures(args)?,
                mode: value(args, "--mode").unwrap_or("auto").parse()?,
                explain: args.iter().any(|a| a == "--explain"),
            };
            print_json(&service.predict(&request).await?)
        }
        other => {
            usage();
            bail!("Unknown command: {}", other)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1).cloned() else {
        usage();
        std::process::exit(1);
    };
    if command == "--help" || command == "-h" {
        usage();
        return Ok(());
    }

    let config = ServiceConfig::from_env()?;
    tracing::info!(
        model = %config.model_path.display(),
        storage = ?config.storage,
        "Starting risk service"
    );

    let service = match RiskService::bootstrap(&config).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            std::process::exit(1);
        }
    };

    run(&service, &command, &args[2..]).await
}
