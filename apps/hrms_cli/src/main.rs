mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    ActionError, AttendanceRange, ClientOptions, FetchError, FetchOutcome, FilePart, HrmsClient,
    ListView, Record, SessionStore, ViewSnapshot,
};
use serde_json::Value;
use shared::{
    domain::{EmployeeId, HolidayId, LeaveDayType, LeaveId, LeaveType, LogAction, Role},
    protocol::{ChangePasswordRequest, DailyLog, Employee, NewLeave, ProfileUpdate},
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hrms", about = "Command-line client for the HRMS API")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Leaves {
        #[command(subcommand)]
        action: LeavesCommand,
    },
    Employees {
        #[command(subcommand)]
        action: EmployeesCommand,
    },
    Attendance {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, value_enum, default_value_t = RangeArg::ThisMonth)]
        range: RangeArg,
        #[arg(long, required_if_eq("range", "custom"))]
        start: Option<NaiveDate>,
        #[arg(long, required_if_eq("range", "custom"))]
        end: Option<NaiveDate>,
    },
    Holidays {
        #[command(subcommand)]
        action: HolidaysCommand,
    },
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
    Logs {
        #[command(subcommand)]
        action: LogsCommand,
    },
    Password {
        #[arg(long)]
        current: String,
        #[arg(long = "new")]
        new_password: String,
        #[arg(long)]
        confirm: String,
    },
}

#[derive(Subcommand, Debug)]
enum LeavesCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Apply {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long = "type")]
        leave_type: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        half_day: bool,
    },
    Approve {
        id: i64,
    },
    Reject {
        id: i64,
    },
    /// Remaining leave days of the signed-in employee.
    Balance,
}

#[derive(Subcommand, Debug)]
enum EmployeesCommand {
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Delete {
        id: i64,
    },
    Promote {
        id: i64,
    },
    Edit {
        id: i64,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        date_of_joining: Option<String>,
        #[command(flatten)]
        fields: PersonFields,
        #[arg(long)]
        photo: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum HolidaysCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    Delete {
        id: i64,
    },
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Defaults to the signed-in user.
    Show {
        #[arg(long)]
        id: Option<i64>,
    },
    Edit {
        #[arg(long)]
        id: Option<i64>,
        #[command(flatten)]
        fields: PersonFields,
        #[arg(long)]
        dob: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        photo: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum LogsCommand {
    List,
    CheckIn,
    BreakIn,
    BreakOut,
    CheckOut,
}

#[derive(clap::Args, Debug, Default)]
struct PersonFields {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    relationship_status: Option<String>,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RangeArg {
    ThisMonth,
    LastMonth,
    Custom,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let settings = config::load_settings()?;
    let api_url = config::normalize_api_url(&settings.api_url)?;
    let client = HrmsClient::new(
        api_url,
        ClientOptions {
            page_size: settings.page_size,
            request_timeout: settings.request_timeout(),
        },
    )?;
    let store = SessionStore::new(&settings.session_path);

    match args.command {
        Command::Login { username, password } => {
            let mut session = client.login(&username, &password).await?;
            match client.refresh_role().await {
                Ok(refreshed) => session = refreshed,
                Err(err) => warn!(error = %err, "could not confirm the role; keeping the login role"),
            }
            store.save(&session).await?;
            println!("Signed in as {}", session.display_name());
        }
        Command::Logout => {
            client.logout().await;
            store.clear().await?;
            println!("Signed out.");
        }
        command => {
            let session = store
                .load()
                .await?
                .context("not signed in; run `hrms login` first")?;
            client.restore(session).await;
            if let Err(err) = run(&client, command).await {
                if is_auth_failure(&err) {
                    warn!("session rejected by the server; clearing it");
                    store.clear().await?;
                    bail!("session expired; run `hrms login` again");
                }
                return Err(err);
            }
        }
    }
    Ok(())
}

async fn run(client: &HrmsClient, command: Command) -> Result<()> {
    match command {
        Command::Leaves { action } => run_leaves(client, action).await,
        Command::Employees { action } => run_employees(client, action).await,
        Command::Holidays { action } => run_holidays(client, action).await,
        Command::Profile { action } => run_profile(client, action).await,
        Command::Logs { action } => run_logs(client, action).await,
        Command::Password {
            current,
            new_password,
            confirm,
        } => {
            let message = client
                .change_password(&ChangePasswordRequest {
                    current_password: current,
                    new_password,
                    confirm_password: confirm,
                })
                .await?;
            println!("{message}");
            Ok(())
        }
        Command::Attendance {
            page,
            range,
            start,
            end,
        } => {
            let range = match (range, start, end) {
                (RangeArg::ThisMonth, _, _) => AttendanceRange::ThisMonth,
                (RangeArg::LastMonth, _, _) => AttendanceRange::LastMonth,
                (RangeArg::Custom, Some(start), Some(end)) => {
                    if start > end {
                        bail!("--start must not be after --end");
                    }
                    AttendanceRange::Custom { start, end }
                }
                (RangeArg::Custom, _, _) => bail!("--range custom needs --start and --end"),
            };
            let view = client.attendance_report(range);
            let snapshot = load_page(&view, page).await?;
            print_table(
                &["Date", "Entry", "Exit", "Break", "Net hours"],
                snapshot
                    .records()
                    .iter()
                    .map(|r| {
                        vec![
                            r.date.to_string(),
                            r.entry_time.clone().unwrap_or_default(),
                            r.exit_time.clone().unwrap_or_default(),
                            value_cell(r.total_break_hours.as_ref()),
                            value_cell(r.net_working_hours.as_ref()),
                        ]
                    })
                    .collect(),
                &snapshot,
            );
            if let Some(first) = snapshot.records().first() {
                println!(
                    "Present days: {}  Late days: {}  Half days: {}",
                    value_cell(first.summary.total_present_days.as_ref()),
                    value_cell(first.summary.total_late_days.as_ref()),
                    value_cell(first.summary.total_half_days.as_ref()),
                );
            }
            Ok(())
        }
        Command::Login { .. } | Command::Logout => Ok(()),
    }
}

async fn run_leaves(client: &HrmsClient, action: LeavesCommand) -> Result<()> {
    let view = client.leaves().await;
    match action {
        LeavesCommand::List { page } => {
            let snapshot = load_page(&view, page).await?;
            print_table(
                &["ID", "Date", "Type", "Day", "Status", "Reason"],
                snapshot
                    .records()
                    .iter()
                    .map(|l| {
                        vec![
                            l.id.to_string(),
                            l.date.to_string(),
                            format!("{:?}", l.leave_type),
                            match l.leave_day_type {
                                LeaveDayType::FullDay => "Full day".to_string(),
                                LeaveDayType::HalfDay => "Half day".to_string(),
                            },
                            l.status.to_string(),
                            l.reason.clone(),
                        ]
                    })
                    .collect(),
                &snapshot,
            );
        }
        LeavesCommand::Apply {
            date,
            leave_type,
            reason,
            half_day,
        } => {
            let leave_type = LeaveType::parse(&leave_type)
                .with_context(|| format!("unknown leave type '{leave_type}'"))?;
            let leave = NewLeave {
                date,
                leave_type,
                reason,
                leave_day_type: if half_day {
                    LeaveDayType::HalfDay
                } else {
                    LeaveDayType::FullDay
                },
            };
            view.apply(&leave).await?;
            report(&view).await;
        }
        LeavesCommand::Approve { id } => {
            view.refresh().await?;
            view.approve(LeaveId(id)).await?;
            report(&view).await;
        }
        LeavesCommand::Reject { id } => {
            view.refresh().await?;
            view.reject(LeaveId(id)).await?;
            report(&view).await;
        }
        LeavesCommand::Balance => {
            let details = client.leave_details().await?;
            for (label, days) in [
                ("Paid", details.remaining_paid_leave),
                ("Unpaid", details.remaining_unpaid_leave),
                ("Casual", details.remaining_casual_leave),
                ("Sick", details.remaining_sick_leave),
            ] {
                println!("{label:<8}{days}");
            }
            println!("Approved so far: {}", details.total_approved_leaves);
        }
    }
    Ok(())
}

async fn run_employees(client: &HrmsClient, action: EmployeesCommand) -> Result<()> {
    match action {
        EmployeesCommand::List { search, page } => {
            let view = client.employees(&search);
            let snapshot = load_page(&view, page).await?;
            print_table(
                &["ID", "Name", "Email", "Department", "Role"],
                snapshot
                    .records()
                    .iter()
                    .map(|e| {
                        vec![
                            e.id.to_string(),
                            e.full_name(),
                            e.email.clone(),
                            e.department.clone(),
                            match Role::from_is_staff(e.is_staff) {
                                Role::Admin => "HR".to_string(),
                                Role::Employee => "Employee".to_string(),
                            },
                        ]
                    })
                    .collect(),
                &snapshot,
            );
        }
        EmployeesCommand::Delete { id } => {
            let view = client.employees("");
            view.refresh().await?;
            if !view.begin_delete(EmployeeId(id).into()).await {
                bail!(ActionError::busy(Some(&EmployeeId(id).into())));
            }
            view.confirm_delete().await?;
            report(&view).await;
        }
        EmployeesCommand::Promote { id } => {
            let view = client.employees("");
            view.refresh().await?;
            view.promote_to_hr(EmployeeId(id)).await?;
            report(&view).await;
        }
        EmployeesCommand::Edit {
            id,
            username,
            date_of_joining,
            fields,
            photo,
        } => {
            let id = EmployeeId(id);
            client.ensure_can_manage(id).await?;
            let photo = match photo {
                Some(path) => vec![read_image(&path, "profile").await?],
                None => Vec::new(),
            };
            let view = client.employees("");
            view.refresh().await?;
            view.edit(
                &id.into(),
                |employee| {
                    set_if(&mut employee.username, username);
                    set_if(&mut employee.date_of_joining, date_of_joining);
                    apply_person_fields(employee, fields);
                },
                photo,
            )
            .await?;
            report(&view).await;
        }
    }
    Ok(())
}

async fn run_holidays(client: &HrmsClient, action: HolidaysCommand) -> Result<()> {
    let view = client.holidays();
    match action {
        HolidaysCommand::List { page } => {
            let snapshot = load_page(&view, page).await?;
            print_table(
                &["ID", "Date", "Name"],
                snapshot
                    .records()
                    .iter()
                    .map(|h| vec![h.id.to_string(), h.date.to_string(), h.name.clone()])
                    .collect(),
                &snapshot,
            );
        }
        HolidaysCommand::Add { name, date, image } => {
            let image = match image {
                Some(path) => Some(read_image(&path, "holiday_image").await?),
                None => None,
            };
            view.add_holiday(&name, date, image).await?;
            report(&view).await;
        }
        HolidaysCommand::Delete { id } => {
            view.refresh().await?;
            view.delete_holiday(HolidayId(id)).await?;
            report(&view).await;
        }
        HolidaysCommand::Edit {
            id,
            name,
            date,
            image,
        } => {
            let image = match image {
                Some(path) => Some(read_image(&path, "holiday_image").await?),
                None => None,
            };
            view.refresh().await?;
            view.edit_holiday(HolidayId(id), name.as_deref(), date, image)
                .await?;
            report(&view).await;
        }
    }
    Ok(())
}

async fn run_profile(client: &HrmsClient, action: ProfileCommand) -> Result<()> {
    match action {
        ProfileCommand::Show { id } => {
            let profile = match id {
                Some(id) => client.profile(EmployeeId(id)).await?,
                None => client.my_profile().await?,
            };
            print_profile(&profile);
        }
        ProfileCommand::Edit {
            id,
            fields,
            dob,
            bio,
            photo,
        } => {
            let id = match id {
                Some(id) => EmployeeId(id),
                None => client.my_id().await?,
            };
            let update = ProfileUpdate {
                first_name: fields.first_name,
                last_name: fields.last_name,
                email: fields.email,
                gender: fields.gender,
                relationship_status: fields.relationship_status,
                department: fields.department,
                dob,
                phone_number: fields.phone,
                address: fields.address,
                bio,
            };
            let photo = match photo {
                Some(path) => Some(read_image(&path, "profile").await?),
                None => None,
            };
            client.update_profile(id, &update, photo).await?;
            println!("Profile updated successfully.");
        }
    }
    Ok(())
}

async fn run_logs(client: &HrmsClient, action: LogsCommand) -> Result<()> {
    let logs = match action {
        LogsCommand::List => client.daily_logs().await?,
        LogsCommand::CheckIn => client.log_action(LogAction::CheckIn).await?,
        LogsCommand::BreakIn => client.log_action(LogAction::BreakIn).await?,
        LogsCommand::BreakOut => client.log_action(LogAction::BreakOut).await?,
        LogsCommand::CheckOut => client.log_action(LogAction::CheckOut).await?,
    };
    if logs.is_empty() {
        println!("No logs for today.");
    }
    for log in &logs {
        let breaks: Vec<String> = log
            .breaks
            .iter()
            .map(|b| {
                format!(
                    "{}-{}",
                    b.break_in.as_deref().unwrap_or("-"),
                    b.break_out.as_deref().unwrap_or("-")
                )
            })
            .collect();
        println!(
            "In {}  Out {}  Breaks {}",
            log.check_in.as_deref().unwrap_or("-"),
            log.check_out.as_deref().unwrap_or("-"),
            if breaks.is_empty() { "-".to_string() } else { breaks.join(", ") }
        );
    }
    let next: Vec<&str> = DailyLog::available_actions(&logs)
        .iter()
        .map(LogAction::as_str)
        .collect();
    println!("Next: {}", if next.is_empty() { "none".to_string() } else { next.join(", ") });
    Ok(())
}

fn set_if(target: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn apply_person_fields(employee: &mut Employee, fields: PersonFields) {
    set_if(&mut employee.first_name, fields.first_name);
    set_if(&mut employee.last_name, fields.last_name);
    set_if(&mut employee.email, fields.email);
    set_if(&mut employee.gender, fields.gender);
    set_if(&mut employee.relationship_status, fields.relationship_status);
    set_if(&mut employee.department, fields.department);
    set_if(&mut employee.phone_number, fields.phone);
    set_if(&mut employee.address, fields.address);
}

fn print_profile(employee: &Employee) {
    let rows = [
        ("Name", employee.full_name()),
        ("Username", employee.username.clone()),
        ("Email", employee.email.clone()),
        ("Department", employee.department.clone()),
        ("Gender", employee.gender.clone()),
        ("Relationship", employee.relationship_status.clone()),
        ("Birth date", employee.dob.clone().unwrap_or_default()),
        ("Phone", employee.phone_number.clone()),
        ("Address", employee.address.clone()),
        ("Bio", employee.bio.clone()),
    ];
    for (label, value) in rows {
        println!("{label:<14}{value}");
    }
}

/// Loads page 1, then moves to `page` when asked for a later one.
async fn load_page<R: Record>(view: &ListView<R>, page: u32) -> Result<ViewSnapshot<R>> {
    view.refresh().await?;
    if page != 1 && view.on_page_change(page).await? == FetchOutcome::Skipped {
        let total = view.snapshot().await.pagination.total_pages();
        bail!("page {page} is out of range (1-{total})");
    }
    Ok(view.snapshot().await)
}

async fn read_image(path: &Path, field: &str) -> Result<FilePart> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image '{}'", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let mime_type = match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };
    Ok(FilePart::new(field, file_name, mime_type, bytes))
}

async fn report<R: Record>(view: &ListView<R>) {
    if let Some(message) = view.snapshot().await.state.message() {
        println!("{message}");
    }
}

fn is_auth_failure(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<FetchError>(), Some(FetchError::Auth(_)))
        || err
            .downcast_ref::<ActionError>()
            .is_some_and(ActionError::is_auth)
}

fn value_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn print_table<R: Record>(headers: &[&str], rows: Vec<Vec<String>>, snapshot: &ViewSnapshot<R>) {
    if rows.is_empty() {
        println!("No records found.");
        return;
    }
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}", width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    println!("{}", line(headers.to_vec()));
    for row in &rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
    println!("{}", snapshot.pagination.label());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employee_edit_flags_reach_the_draft() {
        let args = Args::try_parse_from([
            "hrms",
            "employees",
            "edit",
            "3",
            "--department",
            "Finance",
            "--phone",
            "555-0103",
        ])
        .expect("parse");
        let Command::Employees {
            action: EmployeesCommand::Edit { id, fields, .. },
        } = args.command
        else {
            panic!("expected employees edit");
        };
        assert_eq!(id, 3);

        let mut employee: Employee =
            serde_json::from_value(serde_json::json!({ "id": 3, "first_name": "Ravi" }))
                .expect("employee");
        apply_person_fields(&mut employee, fields);
        assert_eq!(employee.department, "Finance");
        assert_eq!(employee.phone_number, "555-0103");
        assert_eq!(employee.first_name, "Ravi");
    }

    #[test]
    fn clock_subcommands_use_kebab_case() {
        let args = Args::try_parse_from(["hrms", "logs", "break-out"]).expect("parse");
        assert!(matches!(
            args.command,
            Command::Logs {
                action: LogsCommand::BreakOut
            }
        ));
    }
}
