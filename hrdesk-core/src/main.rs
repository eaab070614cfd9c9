// src/main.rs
use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hrdesk_core::aggregator::filter_users;
use hrdesk_core::export::{build_workbook_sheets, export_users};
use hrdesk_core::permission::parse_permission_date;
use hrdesk_core::view::month_options;
use hrdesk_core::{
    AttendanceAggregator, AttendanceView, Company, CompanyContext, DisplayUser, HrClient,
    HrConfig, Period, PermissionDesk, PermissionForm, PermissionTypology, SessionContext,
};

#[derive(Parser, Debug)]
#[command(name = "hrdesk", version, about = "Attendance, export and permission requests")]
struct Cli {
    /// Overrides HRDESK_API_BASE_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the attendance table of a company
    Attendance(PeriodArgs),
    /// Export the attendance table to a workbook, one sheet per user
    Export {
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// File name prefix, defaults to HRDESK_EXPORT_BASE_NAME
        #[arg(long)]
        base: Option<String>,
        /// Write CSV instead of xlsx
        #[arg(long)]
        csv: bool,
    },
    /// List the selectable months
    Months,
    #[command(subcommand)]
    Permissions(PermissionCommand),
    #[command(subcommand)]
    Companies(CompanyCommand),
}

#[derive(Args, Debug)]
struct PeriodArgs {
    #[arg(long)]
    company: i64,
    /// Defaults to the current year; pass --all-time to drop the filter
    #[arg(long)]
    year: Option<i32>,
    /// Zero-based month (0 = January). Defaults to the current month unless --year is given,
    /// in which case the whole year is shown
    #[arg(long)]
    month: Option<u32>,
    /// Do not restrict to a year or month
    #[arg(long, conflicts_with_all = ["year", "month"])]
    all_time: bool,
    /// Case-insensitive filter on name and company
    #[arg(long)]
    filter: Option<String>,
}

impl PeriodArgs {
    fn period(&self, today: NaiveDate) -> Period {
        if self.all_time {
            return Period::default();
        }
        match (self.year, self.month) {
            (Some(year), month) => Period::new(Some(year), month),
            (None, Some(month)) => Period::new(Some(today.year()), Some(month)),
            (None, None) => Period::containing(today),
        }
    }
}

#[derive(Subcommand, Debug)]
enum PermissionCommand {
    /// Permissions requested by a user
    List {
        #[arg(long)]
        user: i64,
    },
    /// Request a permission for one or more days
    Request {
        #[arg(long)]
        user: i64,
        /// Malattia, "Permesso ROL" or Ferie
        #[arg(long)]
        typology: PermissionTypology,
        /// DD-MM-YYYY, repeatable
        #[arg(long = "date", required = true)]
        dates: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CompanyCommand {
    List,
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = HrConfig::from_env().context("Loading HRDESK_* configuration failed")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    info!("Using HR API at {}", config.api_base_url);

    let client = Arc::new(HrClient::new(&config).context("Creating HR client failed")?);

    if let Err(e) = run(cli.command, &config, client).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(command: Command, config: &HrConfig, client: Arc<HrClient>) -> Result<()> {
    match command {
        Command::Attendance(args) => {
            let view = load_view(config, client, &args).await?;
            let users = view.users().await;
            let shown = match &args.filter {
                Some(query) => filter_users(&users, query),
                None => users.iter().collect(),
            };
            print_table(&shown);
        }
        Command::Export {
            period,
            out_dir,
            base,
            csv,
        } => {
            let view = load_view(config, client, &period).await?;
            let users = view.users().await;
            let users: Vec<DisplayUser> = match &period.filter {
                Some(query) => filter_users(&users, query).into_iter().cloned().collect(),
                None => users,
            };
            let aggregator = view.aggregator();
            let sheets =
                build_workbook_sheets(&users, aggregator.calendar(), aggregator.offset());
            let dir = out_dir.unwrap_or_else(|| config.export_dir.clone());
            let base = base.unwrap_or_else(|| config.export_base_name.clone());
            let path = export_users(&sheets, &dir, &base, Utc::now(), csv)
                .context("Export failed")?;
            println!("{}", path.display());
        }
        Command::Months => {
            for option in month_options(Local::now().date_naive()) {
                println!("{:>2}  {} {}", option.code, option.name, option.year);
            }
        }
        Command::Permissions(PermissionCommand::List { user }) => {
            let desk = PermissionDesk::new(&*client, &*client);
            let permissions = desk.list(&SessionContext { user_id: user }).await?;
            if permissions.is_empty() {
                println!("No permissions for user {}", user);
            }
            for p in permissions {
                println!("{:<14} {}", p.typology, p.date_list().join(", "));
            }
        }
        Command::Permissions(PermissionCommand::Request {
            user,
            typology,
            dates,
        }) => {
            let dates = dates
                .iter()
                .map(|d| parse_permission_date(d))
                .collect::<Result<Vec<_>, _>>()?;
            let desk = PermissionDesk::new(&*client, &*client);
            let created = desk
                .submit(
                    &SessionContext { user_id: user },
                    &PermissionForm::new(typology, dates),
                )
                .await?;
            println!("Requested {} for {}", created.typology, created.dates);
        }
        Command::Companies(CompanyCommand::List) => {
            for company in client.get_companies().await? {
                println!("{:>6}  {}", company.id, company.name);
            }
        }
        Command::Companies(CompanyCommand::Delete { id }) => {
            client.delete_company(id).await?;
            println!("Company {} deleted", id);
        }
    }
    Ok(())
}

async fn load_view(
    config: &HrConfig,
    client: Arc<HrClient>,
    args: &PeriodArgs,
) -> Result<AttendanceView<HrClient>> {
    let calendar = config.holiday_calendar().map_err(anyhow::Error::msg)?;
    let offset = config.offset().map_err(anyhow::Error::msg)?;
    let view = AttendanceView::new(client, AttendanceAggregator::new(calendar, offset));

    // The name is only used for display; the backend scopes by id
    let company = CompanyContext::new(Company {
        id: args.company,
        name: format!("#{}", args.company),
    });
    view.reload(&company, args.period(Local::now().date_naive())).await?;
    Ok(view)
}

fn print_table(users: &[&DisplayUser]) {
    if users.is_empty() {
        println!("No users found");
        return;
    }
    for user in users {
        println!(
            "{}  [{}]  joined {}  total {}",
            user.full_name,
            user.company.as_deref().unwrap_or("-"),
            user.joined_on,
            user.total_hours
        );
        for row in &user.attendances {
            let check_out = row
                .attendance
                .check_out
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "    {}  ->  {}  {:>6}{}",
                row.attendance.check_in.to_rfc3339(),
                check_out,
                row.worked_hours,
                if row.check_is_weekend { "  (weekend/festivo)" } else { "" }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(year: Option<i32>, month: Option<u32>, all_time: bool) -> PeriodArgs {
        PeriodArgs {
            company: 1,
            year,
            month,
            all_time,
            filter: None,
        }
    }

    #[test]
    fn period_defaults_and_whole_year() {
        let today = NaiveDate::from_ymd_opt(2024, 10, 17).unwrap();
        assert_eq!(args(None, None, false).period(today), Period::new(Some(2024), Some(9)));
        assert_eq!(args(Some(2023), None, false).period(today), Period::new(Some(2023), None));
        assert_eq!(
            args(Some(2023), Some(1), false).period(today),
            Period::new(Some(2023), Some(1))
        );
        assert_eq!(args(None, Some(3), false).period(today), Period::new(Some(2024), Some(3)));
        assert_eq!(args(None, None, true).period(today), Period::default());
    }

    #[test]
    fn cli_parses_year_without_month() {
        let cli = Cli::try_parse_from(["hrdesk", "attendance", "--company", "4", "--year", "2023"])
            .unwrap();
        match cli.command {
            Command::Attendance(args) => {
                assert_eq!(args.company, 4);
                assert_eq!(args.year, Some(2023));
                assert_eq!(args.month, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
