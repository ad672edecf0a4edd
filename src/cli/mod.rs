use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};

use crate::application::{
    GroupUpdate, LedgerService, NewBill, NewGroup, ProofOutcome, RolloverTask,
};
use crate::config::Config;
use crate::domain::{
    Bill, Cycle, Group, PaymentAccount, PaymentMethod, format_cents, parse_cents,
};

/// Subshare - shared subscription ledger
#[derive(Parser)]
#[command(name = "subshare")]
#[command(about = "Split recurring subscriptions across a group and reconcile payment slips")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides DB_PATH)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Group management commands
    #[command(subcommand)]
    Group(GroupCommands),

    /// Bill management commands
    #[command(subcommand)]
    Bill(BillCommands),

    /// Submit a payment slip for a bill
    Submit {
        /// Bill ID
        bill_id: i64,

        /// Member submitting the slip
        #[arg(short, long)]
        member: String,

        /// Slip image file
        #[arg(short, long)]
        file: PathBuf,

        /// Amount the member says they paid (e.g., "100.00")
        #[arg(short, long)]
        amount: Option<String>,
    },

    /// Open a new billing cycle for groups due on a day of month
    Rollover {
        /// Due day (defaults to today's day of month)
        #[arg(long)]
        day: Option<u32>,
    },

    /// Run the daily rollover in the foreground until interrupted
    Daemon,
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Create a new group
    Create {
        /// Group name
        name: String,

        /// Total subscription amount per cycle (e.g., "300.00")
        #[arg(short, long)]
        amount: String,

        /// Day of month the cycle rolls over (1-31)
        #[arg(long)]
        due_day: u32,

        /// Owner member ID (becomes the first member)
        #[arg(short, long)]
        owner: String,

        /// Discord guild the group belongs to
        #[arg(short, long)]
        guild: String,

        /// Receiving account type: bank, promptpay
        #[arg(long, default_value = "promptpay")]
        method: String,

        /// Receiving account number or PromptPay ID
        #[arg(long)]
        account: String,
    },

    /// Show a group and its members
    Show {
        /// Group ID
        id: i64,
    },

    /// Change a group's settings (members are kept)
    Update {
        /// Group ID
        id: i64,

        #[arg(short, long)]
        name: Option<String>,

        /// Total subscription amount per cycle
        #[arg(short, long)]
        amount: Option<String>,

        #[arg(long)]
        due_day: Option<u32>,

        /// New owner member ID
        #[arg(short, long)]
        owner: Option<String>,

        #[arg(short, long)]
        guild: Option<String>,

        /// Receiving account type: bank, promptpay
        #[arg(long)]
        method: Option<String>,

        #[arg(long)]
        account: Option<String>,
    },

    /// Delete a group (its bills are kept)
    Delete {
        /// Group ID
        id: i64,
    },

    /// Invite members to a group
    Invite {
        /// Group ID
        id: i64,

        /// Member issuing the invite (must be the owner)
        #[arg(long = "by")]
        requester: String,

        /// Member IDs to invite
        #[arg(required = true)]
        members: Vec<String>,
    },

    /// Accept a pending invite
    Accept {
        /// Group ID
        id: i64,

        #[arg(short, long)]
        member: String,
    },

    /// Record a payment against a member's debt
    Pay {
        /// Group ID
        id: i64,

        #[arg(short, long)]
        member: String,

        /// Amount paid (e.g., "100.00")
        #[arg(short, long)]
        amount: String,
    },
}

#[derive(Subcommand)]
pub enum BillCommands {
    /// Create an ad hoc bill
    Create {
        /// Group ID
        #[arg(short, long)]
        group: i64,

        /// Member ID
        #[arg(short, long)]
        member: String,

        /// Amount due (e.g., "100.00")
        #[arg(short, long)]
        amount: String,

        /// Cycle year (defaults to current year)
        #[arg(long)]
        year: Option<i32>,

        /// Cycle month (defaults to current month)
        #[arg(long)]
        month: Option<u32>,

        /// Currency code (defaults to SUBSHARE_CURRENCY)
        #[arg(short, long)]
        currency: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// List bills of a group, a member, or a member within a group
    List {
        #[arg(short, long)]
        group: Option<i64>,

        #[arg(short, long)]
        member: Option<String>,
    },

    /// Show detailed bill information
    Show {
        /// Bill ID
        id: i64,
    },
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(path) = &self.database {
            config.database_path = PathBuf::from(path);
        }
        config
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();
        let database = config.database_path.to_string_lossy().into_owned();

        match self.command {
            Commands::Init => {
                LedgerService::init(&database, &config).await?;
                println!("Database initialized: {}", database);
            }

            Commands::Group(cmd) => {
                let service = LedgerService::connect(&database, &config).await?;
                run_group_command(&service, cmd).await?;
            }

            Commands::Bill(cmd) => {
                let service = LedgerService::connect(&database, &config).await?;
                run_bill_command(&service, &config, cmd).await?;
            }

            Commands::Submit {
                bill_id,
                member,
                file,
                amount,
            } => {
                let service = LedgerService::connect(&database, &config).await?;
                run_submit_command(&service, bill_id, &member, &file, amount).await?;
            }

            Commands::Rollover { day } => {
                let service = LedgerService::connect(&database, &config).await?;
                let day = day.unwrap_or_else(|| Utc::now().day());
                let report = service.rollover_cycle(day).await?;

                println!(
                    "Rolled over {} group(s) for day {} ({}): {} bill(s) opened",
                    report.groups.len(),
                    report.due_day,
                    report.cycle,
                    report.bills.len()
                );
                for failure in &report.failures {
                    eprintln!("  group {} failed: {}", failure.group_id, failure.error);
                }
            }

            Commands::Daemon => {
                let service = LedgerService::connect(&database, &config).await?;
                let task = RolloverTask::new();
                let shutdown = async {
                    let _ = tokio::signal::ctrl_c().await;
                };

                println!(
                    "Checking for rollovers every {}s. Press Ctrl-C to stop.",
                    config.rollover_check_period.as_secs()
                );
                tokio::spawn(task.run(
                    service.group_service(),
                    config.rollover_check_period,
                    shutdown,
                ))
                .await
                .context("Rollover task panicked")?;
            }
        }

        Ok(())
    }
}

fn parse_method(method: &str) -> Result<PaymentMethod> {
    PaymentMethod::from_str(method).with_context(|| {
        format!(
            "Invalid payment method '{}'. Valid methods: bank, promptpay",
            method
        )
    })
}

async fn run_group_command(service: &LedgerService, cmd: GroupCommands) -> Result<()> {
    match cmd {
        GroupCommands::Create {
            name,
            amount,
            due_day,
            owner,
            guild,
            method,
            account,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '300.00' or '300'")?;
            let payment_account = PaymentAccount::new(parse_method(&method)?, account);

            let group = service
                .create_group(NewGroup {
                    name,
                    amount: amount_cents,
                    due_day,
                    discord_guild_id: guild,
                    owner_id: owner,
                    payment_account,
                })
                .await?;
            println!(
                "Created group: {} (id {}, {} due on day {})",
                group.name,
                group.id,
                format_cents(group.amount),
                group.due_day
            );
        }

        GroupCommands::Show { id } => {
            let group = service.get_group(id).await?;
            print_group(&group);
        }

        GroupCommands::Update {
            id,
            name,
            amount,
            due_day,
            owner,
            guild,
            method,
            account,
        } => {
            let current = service.get_group(id).await?;

            let amount = match amount {
                Some(a) => parse_cents(&a).context("Invalid amount format. Use '300.00' or '300'")?,
                None => current.amount,
            };
            let payment_account = PaymentAccount::new(
                match method {
                    Some(m) => parse_method(&m)?,
                    None => current.payment_account.method,
                },
                account.unwrap_or(current.payment_account.account),
            );

            let group = service
                .update_group(
                    id,
                    GroupUpdate {
                        name: name.unwrap_or(current.name),
                        amount,
                        due_day: due_day.unwrap_or(current.due_day),
                        members: current.members,
                        discord_guild_id: guild.unwrap_or(current.discord_guild_id),
                        owner_id: owner.unwrap_or(current.owner_id),
                        payment_account,
                    },
                )
                .await?;
            println!("Updated group: {} (id {})", group.name, group.id);
        }

        GroupCommands::Delete { id } => {
            service.delete_group(id).await?;
            println!("Deleted group: {}", id);
        }

        GroupCommands::Invite {
            id,
            requester,
            members,
        } => {
            service.invite_members(id, &requester, &members).await?;
            println!("Invited {} member(s) to group {}", members.len(), id);
        }

        GroupCommands::Accept { id, member } => {
            let group = service.accept_invite(id, &member).await?;
            println!(
                "{} joined {} ({} per member)",
                member,
                group.name,
                format_cents(group.amount_per_member)
            );
        }

        GroupCommands::Pay { id, member, amount } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '100.00' or '100'")?;
            let settled = service
                .settle_member_payment(id, &member, amount_cents)
                .await?;
            println!(
                "Recorded payment of {} for {}: remaining debt {} ({})",
                format_cents(amount_cents),
                settled.member_id,
                format_cents(settled.debt),
                settled.payment_status
            );
        }
    }
    Ok(())
}

async fn run_bill_command(
    service: &LedgerService,
    config: &Config,
    cmd: BillCommands,
) -> Result<()> {
    match cmd {
        BillCommands::Create {
            group,
            member,
            amount,
            year,
            month,
            currency,
            description,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '100.00' or '100'")?;
            let current = Cycle::of(Utc::now());

            let bill = service
                .create_bill(NewBill {
                    group_id: group,
                    member_id: member,
                    year: year.unwrap_or(current.year),
                    month: month.unwrap_or(current.month),
                    amount_due: amount_cents,
                    currency: currency.unwrap_or_else(|| config.currency.clone()),
                    description,
                })
                .await?;
            println!(
                "Created bill {}: {} {} for {} ({})",
                bill.id,
                format_cents(bill.amount_due),
                bill.currency,
                bill.member_id,
                bill.cycle()
            );
        }

        BillCommands::List { group, member } => {
            let bills = match (group, member) {
                (Some(g), Some(m)) => service.list_bills_by_group_and_member(g, &m).await?,
                (Some(g), None) => service.list_bills_by_group(g).await?,
                (None, Some(m)) => service.list_bills_by_member(&m).await?,
                (None, None) => anyhow::bail!("Specify --group, --member, or both"),
            };
            print_bills(&bills);
        }

        BillCommands::Show { id } => {
            let bill = service.get_bill(id).await?;
            print_bill(&bill);
        }
    }
    Ok(())
}

async fn run_submit_command(
    service: &LedgerService,
    bill_id: i64,
    member: &str,
    file: &Path,
    amount: Option<String>,
) -> Result<()> {
    let claimed = amount
        .map(|a| parse_cents(&a).context("Invalid amount format. Use '100.00' or '100'"))
        .transpose()?;
    let image = std::fs::read(file)
        .with_context(|| format!("Failed to read slip image {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "slip".to_string());

    let result = service
        .submit_and_settle(bill_id, member, claimed, &image, &filename)
        .await?;
    let bill = &result.submission.bill;

    match result.submission.outcome {
        ProofOutcome::Verified => println!(
            "Bill {} verified: paid {} of {} {}",
            bill.id,
            format_cents(bill.amount_paid),
            format_cents(bill.amount_due),
            bill.currency
        ),
        ProofOutcome::Underpaid => println!(
            "Bill {} underpaid: paid {} of {} {} (resubmit with the full amount)",
            bill.id,
            format_cents(bill.amount_paid),
            format_cents(bill.amount_due),
            bill.currency
        ),
        ProofOutcome::Rejected => println!("Bill {} rejected: the slip did not verify", bill.id),
    }

    match result.settlement {
        Ok(settled) => println!(
            "  {} now owes {} ({})",
            settled.member_id,
            format_cents(settled.debt),
            settled.payment_status
        ),
        Err(e) if result.submission.outcome == ProofOutcome::Rejected => {
            anyhow::bail!(e)
        }
        Err(e) => eprintln!("  Warning: debt not updated: {}", e),
    }
    Ok(())
}

fn print_group(group: &Group) {
    println!("Group: {}", group.name);
    println!("  ID:             {}", group.id);
    println!("  Owner:          {}", group.owner_id);
    println!("  Guild:          {}", group.discord_guild_id);
    println!("  Amount:         {}", format_cents(group.amount));
    println!("  Per member:     {}", format_cents(group.amount_per_member));
    println!("  Due day:        {}", group.due_day);
    println!(
        "  Pay to:         {} {}",
        group.payment_account.method, group.payment_account.account
    );
    println!(
        "  Created:        {}",
        group.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!();
    println!("{:<24} {:<10} {:>12} {:<10}", "MEMBER", "STATUS", "DEBT", "PAYMENT");
    println!("{}", "-".repeat(59));
    for member in &group.members {
        println!(
            "{:<24} {:<10} {:>12} {:<10}",
            truncate(&member.member_id, 24),
            member.status,
            format_cents(member.debt),
            member.payment_status
        );
    }
}

fn print_bills(bills: &[Bill]) {
    println!(
        "{:<8} {:<8} {:<8} {:<20} {:>12} {:>12} {:<10}",
        "ID", "GROUP", "CYCLE", "MEMBER", "DUE", "PAID", "STATUS"
    );
    println!("{}", "-".repeat(84));
    for bill in bills {
        println!(
            "{:<8} {:<8} {:<8} {:<20} {:>12} {:>12} {:<10}",
            bill.id,
            bill.group_id,
            bill.cycle().to_string(),
            truncate(&bill.member_id, 20),
            format_cents(bill.amount_due),
            format_cents(bill.amount_paid),
            bill.status
        );
    }
}

fn print_bill(bill: &Bill) {
    const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    println!("Bill: {}", bill.id);
    println!("  Group:          {}", bill.group_id);
    println!("  Member:         {}", bill.member_id);
    println!("  Cycle:          {}", bill.cycle());
    println!(
        "  Amount due:     {} {}",
        format_cents(bill.amount_due),
        bill.currency
    );
    println!(
        "  Amount paid:    {} {}",
        format_cents(bill.amount_paid),
        bill.currency
    );
    println!("  Status:         {}", bill.status);
    if let Some(desc) = &bill.description {
        println!("  Description:    {}", desc);
    }
    println!("  Created:        {}", bill.created_at.format(TIME_FORMAT));
    if let Some(at) = bill.submitted_at {
        println!("  Submitted:      {}", at.format(TIME_FORMAT));
    }
    if let Some(at) = bill.verified_at {
        println!("  Verified:       {}", at.format(TIME_FORMAT));
    }
    if let Some(at) = bill.rejected_at {
        println!("  Rejected:       {}", at.format(TIME_FORMAT));
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
