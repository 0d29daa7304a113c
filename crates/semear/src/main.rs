//! `semear` - donation management console
//!
//! This binary provides the command-line console for registering beneficiary
//! families, logging donations, browsing records, and viewing reports.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;

use semear::cli::{
    Cli, Command, ConfigCommand, DonationCommand, DonationFilterArg, FamilyCommand, HistoryCommand,
    OutputFormat, ReportCommand, SearchCommand, StatusCommand, WatchCommand, WatchTarget,
};
use semear::model::members_from_ages;
use semear::query::{self, DonationStatus};
use semear::session::ConfigAuthenticator;
use semear::{
    init_logging, Config, Donation, DonationDraft, Family, FamilyDraft, FamilyPatch, Ledger,
    Report, Session,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // The session lives for the whole invocation and is torn down on exit.
    let mut session = establish_session(&config, &cli).await?;
    let result = run(cli, &config).await;
    session.sign_out();
    result
}

/// Create the session: authenticated when an admin credential is
/// configured, open (bootstrap mode) when none is.
async fn establish_session(config: &Config, cli: &Cli) -> anyhow::Result<Session> {
    let (Some(account), Some(digest)) = (&config.auth.identifier, &config.auth.secret_hash)
    else {
        return Ok(Session::open());
    };

    let identifier = cli
        .identifier
        .as_deref()
        .context("an admin credential is configured; pass --identifier")?;
    let secret = cli
        .secret
        .as_deref()
        .context("an admin credential is configured; pass --secret")?;

    let authenticator = ConfigAuthenticator::new(account.as_str(), digest.as_str());
    let session = Session::establish(&authenticator, identifier, secret).await?;
    Ok(session)
}

/// Execute the parsed command.
async fn run(cli: Cli, config: &Config) -> anyhow::Result<()> {
    match cli.command {
        // Configuration commands never touch the store.
        Command::Config(cmd) => handle_config(config, cmd),
        command => {
            let mut ledger = Ledger::open(config.database_path())?;
            match command {
                Command::Family(cmd) => handle_family(&mut ledger, config, cmd),
                Command::Donation(cmd) => handle_donation(&mut ledger, config, cmd),
                Command::History(cmd) => handle_history(&ledger, cmd),
                Command::Search(cmd) => handle_search(&ledger, config, cmd),
                Command::Report(cmd) => handle_report(&ledger, config, cmd),
                Command::Watch(cmd) => handle_watch(&ledger, cmd).await,
                Command::Status(cmd) => handle_status(&ledger, config, cmd),
                Command::Config(_) => unreachable!("handled above"),
            }
        }
    }
}

fn handle_family(
    ledger: &mut Ledger,
    config: &Config,
    cmd: FamilyCommand,
) -> anyhow::Result<()> {
    match cmd {
        FamilyCommand::Add(args) => {
            let draft = FamilyDraft {
                responsible_name: args.responsible,
                members: members_from_ages(&args.ages),
                phone: args.phone,
                email: args.email,
                cep: args.cep,
                address: args.address,
                neighborhood: args.neighborhood,
                city: args.city,
                state: args.state,
                complemento: args.complemento,
                number: args.number,
                observations: args.observations,
            };
            let id = ledger.create_family(&draft)?;
            println!("Registered family {id} ({})", draft.responsible_name);
        }
        FamilyCommand::List(args) => {
            let now = Utc::now();
            let mut families = ledger.list_families()?;

            if let Some(term) = &args.term {
                families.retain(|f| query::matches_search(f, term));
            }
            if let Some(neighborhood) = &args.neighborhood {
                families.retain(|f| f.neighborhood == *neighborhood);
            }
            if let Some(filter) = args.filter {
                families.retain(|f| match filter {
                    DonationFilterArg::Recent => {
                        !query::without_recent_donation(f, now, config.console.recent_days)
                    }
                    DonationFilterArg::Stale => {
                        f.last_donation.is_some()
                            && query::without_recent_donation(f, now, config.console.recent_days)
                    }
                    DonationFilterArg::Never => f.last_donation.is_none(),
                });
            }

            let limit = args.limit.unwrap_or(config.console.list_limit);
            families.truncate(limit);

            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&families)?),
                OutputFormat::Table => print_family_table(&families, config),
            }
        }
        FamilyCommand::Show { id, json } => {
            let family = ledger
                .get_family(id)?
                .with_context(|| format!("no family with id {id}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&family)?);
            } else {
                print_family_details(&family, config);
            }
        }
        FamilyCommand::Edit(args) => {
            let patch = FamilyPatch {
                responsible_name: args.responsible,
                members: args.ages.as_deref().map(members_from_ages),
                phone: args.phone,
                email: args.email,
                cep: args.cep,
                address: args.address,
                neighborhood: args.neighborhood,
                city: args.city,
                state: args.state,
                complemento: args.complemento,
                number: args.number,
                observations: args.observations,
            };
            if patch.is_empty() {
                println!("Nothing to update; pass at least one field flag.");
                return Ok(());
            }
            ledger.update_family(args.id, &patch)?;
            println!("Updated family {}", args.id);
        }
        FamilyCommand::Remove { id, yes } => {
            if !yes {
                println!("This will delete family {id}. Donation history is kept.");
                println!("Use --yes to confirm.");
                return Ok(());
            }
            if ledger.delete_family(id)? {
                println!("Deleted family {id} (donation history retained)");
            } else {
                println!("No family with id {id}");
            }
        }
    }
    Ok(())
}

fn handle_donation(
    ledger: &mut Ledger,
    config: &Config,
    cmd: DonationCommand,
) -> anyhow::Result<()> {
    match cmd {
        DonationCommand::Add(args) => {
            let draft = DonationDraft {
                family_id: args.family,
                donation_type: args.donation_type.into(),
                quantity: args.quantity,
                date: parse_instant(args.date.as_deref())?,
                responsible: args.responsible,
                observations: args.observations,
            };
            let id = ledger.create_donation(&draft)?;
            println!(
                "Registered donation {id} for family {} ({})",
                draft.family_id,
                draft.donation_type.label()
            );
        }
        DonationCommand::List(args) => {
            let mut donations = ledger.list_donations()?;
            let limit = args.limit.unwrap_or(config.console.list_limit);
            donations.truncate(limit);

            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&donations)?),
                OutputFormat::Table => print_donation_table(&donations),
            }
        }
        DonationCommand::Remove { id, yes } => {
            if !yes {
                println!("This will delete donation {id} and recompute the family's last donation.");
                println!("Use --yes to confirm.");
                return Ok(());
            }
            ledger.delete_donation(id)?;
            println!("Deleted donation {id}");
        }
    }
    Ok(())
}

fn handle_history(ledger: &Ledger, cmd: HistoryCommand) -> anyhow::Result<()> {
    let family = ledger.get_family(cmd.family)?;
    let donations = ledger.donations_by_family(cmd.family)?;

    if cmd.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&donations)?);
        return Ok(());
    }

    match &family {
        Some(family) => {
            println!("History for {} (family {})", family.responsible_name, family.id);
            match family.last_donation {
                Some(last) => println!("Last donation: {}", last.format("%Y-%m-%d")),
                None => println!("Never received a donation"),
            }
        }
        None => println!(
            "Family {} no longer exists; showing retained history.",
            cmd.family
        ),
    }
    println!();
    print_donation_table(&donations);
    Ok(())
}

fn handle_search(ledger: &Ledger, config: &Config, cmd: SearchCommand) -> anyhow::Result<()> {
    let families = ledger.search_families(&cmd.term)?;
    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&families)?),
        OutputFormat::Table => print_family_table(&families, config),
    }
    Ok(())
}

fn handle_report(ledger: &Ledger, config: &Config, cmd: ReportCommand) -> anyhow::Result<()> {
    let families = ledger.list_families()?;
    let donations = ledger.list_donations()?;
    let report = Report::build(&families, &donations, Utc::now(), config.console.recent_days);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let window = config.console.recent_days;
    println!("semear report");
    println!("-------------");
    println!("Families registered:       {}", report.total_families);
    println!("Donations registered:      {}", report.total_donations);
    println!("Donations this month:      {}", report.donations_this_month);
    println!("Served in last {window} days:    {}", report.families_recent);
    println!("Needing attention:         {}", report.families_needing_attention);
    println!("Service rate:              {}%", report.service_rate);

    if !report.top_types.is_empty() {
        println!();
        println!("Top donation types:");
        for stat in &report.top_types {
            println!(
                "  {:<22} {:>4}  ({}%)",
                stat.donation_type.label(),
                stat.count,
                stat.percentage
            );
        }
    }

    if !report.recent_donations.is_empty() {
        println!();
        println!("Recent donations:");
        for entry in &report.recent_donations {
            println!(
                "  {}  {:<24} {:<22} by {}",
                entry.date.format("%Y-%m-%d"),
                entry.family_name,
                entry.donation_type.label(),
                entry.responsible
            );
        }
    }

    if !report.attention.is_empty() {
        println!();
        println!("Families needing attention:");
        for entry in &report.attention {
            let since = entry
                .days_since
                .map_or_else(|| "never received".to_string(), |d| format!("{d} days ago"));
            println!(
                "  #{:<5} {:<24} {}",
                entry.family_id, entry.responsible_name, since
            );
        }
    }

    Ok(())
}

async fn handle_watch(ledger: &Ledger, cmd: WatchCommand) -> anyhow::Result<()> {
    match cmd.target {
        WatchTarget::Families => {
            let mut sub = ledger.subscribe_families();
            if let Some(snapshot) = sub.snapshot() {
                println!("{} family(ies) currently registered", snapshot.len());
            }
            println!("Watching families; Ctrl-C to stop.");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    update = sub.updated() => match update {
                        Some(snapshot) => println!(
                            "[{}] {} family(ies)",
                            Utc::now().format("%H:%M:%S"),
                            snapshot.len()
                        ),
                        None => break,
                    },
                }
            }
            sub.cancel();
        }
        WatchTarget::Donations => {
            let mut sub = ledger.subscribe_donations();
            if let Some(snapshot) = sub.snapshot() {
                println!("{} donation(s) currently registered", snapshot.len());
            }
            println!("Watching donations; Ctrl-C to stop.");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    update = sub.updated() => match update {
                        Some(snapshot) => println!(
                            "[{}] {} donation(s)",
                            Utc::now().format("%H:%M:%S"),
                            snapshot.len()
                        ),
                        None => break,
                    },
                }
            }
            sub.cancel();
        }
    }
    Ok(())
}

fn handle_status(ledger: &Ledger, config: &Config, cmd: StatusCommand) -> anyhow::Result<()> {
    let stats = ledger.stats()?;

    if cmd.json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "family_count": stats.family_count,
            "donation_count": stats.donation_count,
            "db_size_bytes": stats.db_size_bytes,
            "auth_enabled": config.auth_enabled(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("semear status");
        println!("-------------");
        println!("Database:   {}", config.database_path().display());
        println!("Families:   {}", stats.family_count);
        println!("Donations:  {}", stats.donation_count);
        println!("Size:       {} bytes", stats.db_size_bytes);
        println!(
            "Auth:       {}",
            if config.auth_enabled() {
                "configured"
            } else {
                "bootstrap mode (no credential configured)"
            }
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[store]");
                println!("  Database path:  {}", config.database_path().display());
                println!();
                println!("[auth]");
                println!(
                    "  Credential:     {}",
                    config
                        .auth
                        .identifier
                        .as_deref()
                        .unwrap_or("(none; bootstrap mode)")
                );
                println!();
                println!("[console]");
                println!("  Recent window:    {} days", config.console.recent_days);
                println!("  Moderate window:  {} days", config.console.moderate_days);
                println!("  List limit:       {}", config.console.list_limit);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

/// Parse a donation date: a plain `YYYY-MM-DD` becomes midnight UTC, a full
/// RFC 3339 instant is taken verbatim, and no value means now.
fn parse_instant(raw: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    let Some(raw) = raw else {
        return Ok(Utc::now());
    };

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .context("constructing midnight timestamp")?;
        return Ok(DateTime::from_naive_utc_and_offset(midnight, Utc));
    }

    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("unparseable date: {raw} (expected YYYY-MM-DD or RFC 3339)"))?;
    Ok(parsed.with_timezone(&Utc))
}

fn print_family_table(families: &[Family], config: &Config) {
    let now = Utc::now();
    println!(
        "{:>5}  {:<24}  {:<16}  {:>7}  {:<9}  {}",
        "ID", "RESPONSIBLE", "NEIGHBORHOOD", "MEMBERS", "STATUS", "LAST DONATION"
    );
    for family in families {
        let status = DonationStatus::classify(
            family.last_donation,
            now,
            config.console.recent_days,
            config.console.moderate_days,
        );
        let last = family
            .last_donation
            .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string());
        println!(
            "{:>5}  {:<24}  {:<16}  {:>7}  {:<9}  {last}",
            family.id,
            clip(&family.responsible_name, 24),
            clip(&family.neighborhood, 16),
            family.member_count,
            status.label(),
        );
    }
    println!();
    println!("{} family(ies)", families.len());
}

fn print_family_details(family: &Family, config: &Config) {
    let now = Utc::now();
    println!("Family {}", family.id);
    println!("  Responsible:   {}", family.responsible_name);
    println!("  Phone:         {}", family.phone);
    if let Some(email) = &family.email {
        println!("  E-mail:        {email}");
    }
    let number = family.number.as_deref().unwrap_or("s/n");
    println!("  Address:       {}, {number}", family.address);
    if let Some(complemento) = &family.complemento {
        println!("                 {complemento}");
    }
    println!(
        "                 {} - {} / {}  CEP {}",
        family.neighborhood, family.city, family.state, family.cep
    );
    println!("  Members:       {}", family.member_count);
    for (index, member) in family.members.iter().enumerate() {
        println!("    {}. {} years", index + 1, member.age);
    }
    match family.last_donation {
        Some(last) => println!(
            "  Last donation: {} ({})",
            last.format("%Y-%m-%d"),
            DonationStatus::classify(
                Some(last),
                now,
                config.console.recent_days,
                config.console.moderate_days
            )
            .label()
        ),
        None => println!("  Last donation: never"),
    }
    if let Some(observations) = &family.observations {
        println!("  Notes:         {observations}");
    }
    println!("  Registered:    {}", family.created_at.format("%Y-%m-%d"));
}

fn print_donation_table(donations: &[Donation]) {
    println!(
        "{:>5}  {:<12}  {:<24}  {:<22}  {:<14}  {}",
        "ID", "DATE", "FAMILY", "TYPE", "QUANTITY", "RESPONSIBLE"
    );
    for donation in donations {
        println!(
            "{:>5}  {:<12}  {:<24}  {:<22}  {:<14}  {}",
            donation.id,
            donation.date.format("%Y-%m-%d").to_string(),
            clip(&donation.family_name, 24),
            donation.donation_type.label(),
            clip(&donation.quantity, 14),
            donation.responsible,
        );
    }
    println!();
    println!("{} donation(s)", donations.len());
}

/// Clip a string for table display.
fn clip(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let clipped: String = value.chars().take(max.saturating_sub(1)).collect();
        format!("{clipped}…")
    }
}
