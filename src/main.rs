use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod attendance;
mod calendar;
mod config;
mod dates;
mod duties;
mod error;
mod models;
mod reconcile;
mod report;
mod roster;
mod sheet;
mod state;
mod stats;
mod sync;

use calendar::MonthRange;
use config::Config;
use error::NurseryError;
use models::{Mark, Member, MemberType};
use roster::MemberPatch;
use state::WorkingCopy;
use sync::{AppsScriptClient, SheetExportClient};

#[derive(Parser)]
#[command(name = "nursery-attendance")]
#[command(about = "Nursery roster and weekly attendance synced to the ministry spreadsheet", long_about = None)]
struct Cli {
    /// Working copy file (defaults to NURSERY_STATE)
    #[arg(long, global = true)]
    state: Option<PathBuf>,
    /// Year birthdays are computed for (defaults to NURSERY_YEAR). Week
    /// dates always come from the 2026 Sunday table, so any other year
    /// leaves the birthday row empty.
    #[arg(long, global = true)]
    year: Option<i32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct MemberForm {
    #[arg(long)]
    name: Option<String>,
    /// 학생 or 선생님
    #[arg(long = "type", value_parser = parse_member_type)]
    member_type: Option<MemberType>,
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    age: Option<String>,
    #[arg(long)]
    position: Option<String>,
    #[arg(long)]
    prayer: Option<String>,
    /// YYYY-MM-DD, or an empty string to clear
    #[arg(long)]
    birth_date: Option<String>,
    #[arg(long)]
    reg_date: Option<String>,
    #[arg(long)]
    leave_date: Option<String>,
    #[arg(long)]
    photo_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a student or teacher and push the roster
    AddMember {
        #[command(flatten)]
        form: MemberForm,
    },
    /// Edit a member and push the roster
    EditMember {
        /// Member id or unique name
        #[arg(long)]
        member: String,
        #[command(flatten)]
        form: MemberForm,
    },
    /// Delete a member permanently and push the roster
    DeleteMember {
        #[arg(long)]
        member: String,
        #[arg(long)]
        yes: bool,
    },
    /// List the roster in sheet order
    Members,
    /// Flip one attendance cell between O and X
    Toggle {
        #[arg(long)]
        member: String,
        #[arg(long)]
        week: String,
    },
    /// Set one attendance cell
    Mark {
        #[arg(long)]
        member: String,
        #[arg(long)]
        week: String,
        /// O or X
        #[arg(long, value_parser = parse_mark)]
        value: Mark,
    },
    /// Fill every cell of a week, or clear it when everyone is already present
    BulkSelect {
        #[arg(long)]
        week: String,
    },
    /// Lock a week and save
    Lock {
        #[arg(long)]
        week: String,
    },
    /// Unlock a week and save
    Unlock {
        #[arg(long)]
        week: String,
        #[arg(long)]
        yes: bool,
    },
    /// Reconcile the working copy and push the attendance sheet
    Save,
    /// Replace the working copy with the remote roster and attendance
    Pull,
    /// Show duty schedules for a week or month range
    Duties {
        /// e.g. 3-4 (defaults to the current range)
        #[arg(long)]
        range: Option<String>,
    },
    /// Generate a markdown report for a month range
    Report {
        #[arg(long)]
        range: Option<String>,
        #[arg(long, default_value = "attendance-report.md")]
        out: PathBuf,
        /// Include duty schedules fetched from the sheet
        #[arg(long)]
        with_duties: bool,
    },
}

fn parse_member_type(raw: &str) -> Result<MemberType, String> {
    MemberType::parse(raw).ok_or_else(|| format!("unknown member type {raw:?}"))
}

fn parse_mark(raw: &str) -> Result<Mark, String> {
    Mark::from_cell(raw).ok_or_else(|| format!("expected O or X, got {raw:?}"))
}

fn parse_date_field(raw: Option<String>, field: &str) -> Result<Option<Option<chrono::NaiveDate>>, NurseryError> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(Some(None)),
        Some(value) => dates::parse_date(&value)
            .map(|date| Some(Some(date)))
            .ok_or_else(|| NurseryError::Validation(format!("{field} is not a date: {value}"))),
    }
}

impl MemberForm {
    fn into_patch(self) -> Result<MemberPatch, NurseryError> {
        Ok(MemberPatch {
            birth_date: parse_date_field(self.birth_date, "birth date")?,
            reg_date: parse_date_field(self.reg_date, "registration date")?,
            leave_date: parse_date_field(self.leave_date, "leave date")?,
            name: self.name,
            member_type: self.member_type,
            age: self.age,
            position: self.position,
            group: self.group,
            prayer: self.prayer,
            photo_url: self.photo_url,
        })
    }
}

fn range_or_default(raw: Option<&str>, today: chrono::NaiveDate) -> anyhow::Result<MonthRange> {
    match raw {
        Some(value) => MonthRange::parse(value)
            .with_context(|| format!("{value:?} is not one of 1-2, 3-4, 5-6, 7-8, 9-10, 11-12")),
        None => Ok(MonthRange::default_for(today)),
    }
}

/// Pushes the working copy. Local state is already stored, so a failure
/// here leaves the edit in place for a manual retry.
async fn push(config: &Config, copy: &WorkingCopy, members_too: bool) -> anyhow::Result<()> {
    let client = AppsScriptClient::from_config(config)?;
    let result = async {
        if members_too {
            client.save_members(&copy.members, &copy.skipped_members).await?;
        }
        client.save_attendance(&copy.attendance).await
    }
    .await;

    result.context("saved locally, but the remote save failed; run `save` to retry")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nursery_attendance=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let state_path = cli.state.clone().unwrap_or_else(|| config.state_path.clone());
    let year = cli.year.unwrap_or(config.year);
    if !calendar::covers_year(year) {
        tracing::warn!(
            year,
            table_year = calendar::REFERENCE_YEAR,
            "week dates come from the Sunday table; birthdays in another year match no week"
        );
    }
    let today = chrono::Local::now().date_naive();

    let mut copy = WorkingCopy::load(&state_path)?;

    match cli.command {
        Commands::AddMember { form } => {
            let mut member = Member::default();
            form.into_patch()?.apply(&mut member);
            let mut roster = copy.roster();
            let created = roster.create(member, today)?.clone();
            copy.apply(roster, copy.book(), year);
            copy.store(&state_path)?;
            println!("Added {} ({}, {}).", created.name, created.member_type.as_str(), created.id);
            push(&config, &copy, true).await?;
        }
        Commands::EditMember { member, form } => {
            let patch = form.into_patch()?;
            let mut roster = copy.roster();
            let id = roster.find(&member)?.id.clone();
            let updated = roster.update(&id, &patch)?.clone();
            copy.apply(roster, copy.book(), year);
            copy.store(&state_path)?;
            println!("Updated {}.", updated.name);
            push(&config, &copy, true).await?;
        }
        Commands::DeleteMember { member, yes } => {
            if !yes {
                anyhow::bail!("deleting is permanent; pass --yes to confirm");
            }
            let mut roster = copy.roster();
            let id = roster.find(&member)?.id.clone();
            let removed = roster.delete(&id)?;
            copy.apply(roster, copy.book(), year);
            copy.store(&state_path)?;
            println!("Deleted {}.", removed.name);
            push(&config, &copy, true).await?;
        }
        Commands::Members => {
            let roster = copy.roster();
            if roster.members().is_empty() {
                println!("Roster is empty.");
                return Ok(());
            }
            println!(
                "실 인원: 학생 {}명, 교사 {}명",
                roster.active_count(MemberType::Student, today),
                roster.active_count(MemberType::Teacher, today)
            );
            for member in roster::canonical_order(roster.members()) {
                let linked = match member.member_type {
                    MemberType::Student => &member.teacher,
                    MemberType::Teacher => &member.assigned_students,
                };
                println!(
                    "- [{}] {} {} ({}) {} {}",
                    member.member_type.as_str(),
                    member.group,
                    member.name,
                    member.id,
                    linked,
                    roster::inactive_label(member, today)
                );
            }
        }
        Commands::Toggle { member, week } => {
            let roster = copy.roster();
            let target = roster.find(&member)?;
            let mut book = copy.book();
            let mark = book.toggle(target, &week)?;
            println!("{} {} -> {}", target.name, week, mark.as_str());
            copy.stage(book);
            copy.store(&state_path)?;
        }
        Commands::Mark { member, week, value } => {
            let roster = copy.roster();
            let target = roster.find(&member)?;
            let mut book = copy.book();
            book.set_mark(target, &week, value)?;
            println!("{} {} -> {}", target.name, week, value.as_str());
            copy.stage(book);
            copy.store(&state_path)?;
        }
        Commands::BulkSelect { week } => {
            let mut book = copy.book();
            let mark = book.bulk_select(&copy.members, &week)?;
            println!("{week}: every member set to {}", mark.as_str());
            copy.stage(book);
            copy.store(&state_path)?;
        }
        Commands::Lock { week } => {
            let mut book = copy.book();
            book.lock_week(&week)?;
            copy.apply(copy.roster(), book, year);
            copy.store(&state_path)?;
            println!("{week} locked.");
            push(&config, &copy, false).await?;
        }
        Commands::Unlock { week, yes } => {
            let mut book = copy.book();
            book.unlock_week(&week, yes)?;
            copy.apply(copy.roster(), book, year);
            copy.store(&state_path)?;
            println!("{week} unlocked.");
            push(&config, &copy, false).await?;
        }
        Commands::Save => {
            let sheet = copy.apply(copy.roster(), copy.book(), year);
            copy.store(&state_path)?;
            push(&config, &copy, false).await?;
            println!(
                "Saved {} members across {} weeks.",
                sheet.member_rows().count(),
                sheet.headers.len() - reconcile::IDENTITY_HEADERS.len()
            );
        }
        Commands::Pull => {
            let client = AppsScriptClient::from_config(&config)?;
            let remote = client.list().await?;
            let mut roster = roster::Roster::new(remote.members);
            let assigned = roster.assign_missing_ids();
            copy.members = roster.into_members();
            copy.skipped_members = remote.skipped_members;
            copy.attendance = remote.attendance;
            copy.store(&state_path)?;
            println!(
                "Pulled {} members and {} attendance rows.",
                copy.members.len(),
                copy.attendance.records.len()
            );
            if !copy.skipped_members.is_empty() {
                println!(
                    "Set aside {} member rows with an unknown type; they are saved back unchanged.",
                    copy.skipped_members.len()
                );
            }
            if assigned > 0 {
                client
                    .save_members(&copy.members, &copy.skipped_members)
                    .await
                    .context("failed to store newly assigned member ids")?;
                println!("Assigned ids to {assigned} members.");
            }
        }
        Commands::Duties { range } => {
            let range = range_or_default(range.as_deref(), today)?;
            let duties = SheetExportClient::new().fetch_duties(&config).await?;
            for month in range.months() {
                for verse in duties.verses_for_month(month) {
                    println!("{month}월 암송말씀: {verse}");
                }
            }
            for week in range.weeks() {
                let assigned = duties.for_week(&week.label);
                println!(
                    "{} {}: 기도 {}, 헌금 {}, 청소 {}",
                    week.label,
                    week.display_date(),
                    assigned.prayer.unwrap_or("-"),
                    assigned.offering.unwrap_or("-"),
                    assigned.cleaning.join(", ")
                );
            }
        }
        Commands::Report {
            range,
            out,
            with_duties,
        } => {
            let range = range_or_default(range.as_deref(), today)?;
            let sheet = reconcile::reconcile(&copy.members, &copy.book().into_rows(), year);
            let duties = if with_duties {
                Some(SheetExportClient::new().fetch_duties(&config).await?)
            } else {
                None
            };
            let report = report::build_report(range, &copy.members, &sheet, duties.as_ref(), today);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
