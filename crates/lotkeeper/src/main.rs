//! `lotk` - CLI for lotkeeper
//!
//! This binary checks vehicles in and out, quotes fees, manages the lot
//! layout and writes reports against the lotkeeper database.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;

use lotkeeper::cli::{
    ActivityCommand, CheckinCommand, Cli, Command, ConfigCommand, HistoryCommand, OutputFormat,
    ReportCommand, SpacesCommand, StatusCommand, TicketCommand,
};
use lotkeeper::{
    build_report, init_logging, CheckInRequest, Config, Money, OccupancyStats, ParkingDesk,
    Space, Storage, Ticket, TicketState, Zone,
};

type Desk = ParkingDesk<Storage>;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Config(cmd) => handle_config(&config, cmd),
        Command::Checkin(cmd) => handle_checkin(&mut open_desk(&config)?, &config, &cmd, Utc::now()),
        Command::Checkout(cmd) => {
            handle_checkout(&mut open_desk(&config)?, &config, &cmd, Utc::now())
        }
        Command::Fee(cmd) => handle_fee(&open_desk(&config)?, &config, &cmd, Utc::now()),
        Command::Find(cmd) => handle_find(&open_desk(&config)?, &config, &cmd),
        Command::History(cmd) => handle_history(&open_storage(&config)?, &config, &cmd),
        Command::Spaces(cmd) => handle_spaces(&mut open_storage(&config)?, cmd),
        Command::Status(cmd) => handle_status(&open_storage(&config)?, &cmd),
        Command::Activity(cmd) => handle_activity(&open_storage(&config)?, &cmd),
        Command::Report(cmd) => handle_report(&open_storage(&config)?, &config, &cmd, Utc::now()),
    }
}

fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("failed to open database {}", path.display()))
}

fn open_desk(config: &Config) -> Result<Desk> {
    Ok(ParkingDesk::from_config(open_storage(config)?, config)?)
}

fn handle_checkin(
    desk: &mut Desk,
    config: &Config,
    cmd: &CheckinCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    let request = CheckInRequest {
        plate: cmd.plate.clone(),
        owner_name: cmd.owner.clone(),
        model: cmd.model.clone(),
        space: cmd.space.clone(),
    };
    let ticket = desk.check_in(&request, now)?;
    let payload = serde_json::to_string(&ticket.scan_payload())?;

    if cmd.json {
        let out = serde_json::json!({
            "ticket": ticket,
            "scan_payload": payload,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Checked in {} at space {}", ticket.plate(), ticket.space());
        println!();
        print_ticket(&ticket, config);
        println!();
        println!("Scan payload: {payload}");
    }
    Ok(())
}

fn handle_checkout(
    desk: &mut Desk,
    config: &Config,
    cmd: &TicketCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    let ticket_id = ticket_id_from(desk, cmd)?;
    let ticket = desk.check_out(&ticket_id, now)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&ticket)?);
    } else {
        println!("Checked out {} from space {}", ticket.plate(), ticket.space());
        println!();
        print_ticket(&ticket, config);
    }
    Ok(())
}

fn handle_fee(desk: &Desk, config: &Config, cmd: &TicketCommand, now: DateTime<Utc>) -> Result<()> {
    let ticket_id = ticket_id_from(desk, cmd)?;
    let quote = desk.quote(&ticket_id, now)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&quote)?);
    } else {
        println!("Ticket:        {}", quote.ticket_id);
        println!("Space:         {}", quote.space);
        println!("Checked in:    {}", format_time(quote.check_in_time));
        if quote.closed {
            println!("Checked out:   {}", format_time(quote.until));
        }
        match quote.hourly_rate {
            Some(rate) => println!(
                "Billed:        {} h x {}",
                quote.billed_hours,
                config.format_money(rate)
            ),
            None => println!("Billed:        {} h", quote.billed_hours),
        }
        let label = if quote.closed { "Charged:" } else { "Fee due:" };
        println!("{label:<15}{}", config.format_money(quote.fee));
    }
    Ok(())
}

fn handle_find(desk: &Desk, config: &Config, cmd: &TicketCommand) -> Result<()> {
    let ticket = if cmd.scan {
        desk.resolve_scan(&cmd.ticket)?
    } else {
        desk.find(&cmd.ticket)?
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&ticket)?);
    } else {
        print_ticket(&ticket, config);
    }
    Ok(())
}

fn handle_history(storage: &Storage, config: &Config, cmd: &HistoryCommand) -> Result<()> {
    let tickets = storage.tickets_for_plate(&cmd.plate, cmd.limit)?;

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tickets)?),
        OutputFormat::Table => {
            println!(
                "{:<14} {:<6} {:<20} {:<20} FEE",
                "TICKET", "SPACE", "CHECKED IN", "CHECKED OUT"
            );
            for ticket in &tickets {
                let (out, fee) = match ticket.state() {
                    TicketState::Open => ("open".to_string(), String::new()),
                    TicketState::Closed {
                        check_out_time,
                        fee,
                    } => (format_time(*check_out_time), config.format_money(*fee)),
                };
                println!(
                    "{:<14} {:<6} {:<20} {:<20} {}",
                    ticket.id().to_string(),
                    ticket.space(),
                    format_time(ticket.check_in_time()),
                    out,
                    fee
                );
            }
        }
        OutputFormat::Plain => {
            for ticket in &tickets {
                println!(
                    "{} {} {}",
                    ticket.id(),
                    ticket.space(),
                    format_time(ticket.check_in_time())
                );
            }
        }
    }
    if tickets.is_empty() && cmd.format != OutputFormat::Json {
        println!("No tickets for {}.", cmd.plate.trim().to_uppercase());
    }
    Ok(())
}

fn ticket_id_from(desk: &Desk, cmd: &TicketCommand) -> Result<String> {
    if cmd.scan {
        Ok(desk.resolve_scan(&cmd.ticket)?.id().to_string())
    } else {
        Ok(cmd.ticket.clone())
    }
}

fn handle_spaces(storage: &mut Storage, cmd: SpacesCommand) -> Result<()> {
    match cmd {
        SpacesCommand::List {
            zone,
            available,
            format,
        } => {
            let spaces: Vec<Space> = storage
                .spaces(zone.as_deref())?
                .into_iter()
                .filter(|s| !available || s.is_available())
                .collect();
            print_spaces(&spaces, format)?;
        }
        SpacesCommand::Add {
            zone,
            name,
            count,
            kind,
            rate_cents,
            description,
        } => {
            let existing = storage.get_zone(&zone)?;
            let is_new = existing.is_none();
            let mut zone = existing.unwrap_or_else(|| Zone::new(zone));
            if let Some(name) = name {
                zone.name = name;
            }
            if let Some(cents) = rate_cents {
                zone.hourly_rate = Some(Money::from_cents(cents));
            }

            let created = storage.add_spaces(&zone, count, kind.into(), description.as_deref())?;
            if is_new {
                println!("Created {} ({})", zone.name, zone.code);
            }
            let ids: Vec<&str> = created.iter().map(|s| s.id.as_str()).collect();
            println!("Added {} spaces: {}", created.len(), ids.join(", "));
        }
        SpacesCommand::SetStatus { space, status } => {
            storage.set_space_status(&space, status.into())?;
            println!("Space {space} is now {}", lotkeeper::SpaceStatus::from(status));
        }
        SpacesCommand::SeedDemo => {
            let inserted = storage.seed_demo_lot()?;
            if inserted == 0 {
                println!("Demo lot already present.");
            } else {
                println!("Seeded demo lot with {inserted} spaces.");
            }
        }
    }
    Ok(())
}

fn handle_status(storage: &Storage, cmd: &StatusCommand) -> Result<()> {
    let spaces = storage.spaces(cmd.zone.as_deref())?;
    let occupancy = OccupancyStats::from_spaces(&spaces);
    let stats = storage.stats()?;

    if cmd.json {
        let status = serde_json::json!({
            "zone": cmd.zone,
            "occupancy": occupancy,
            "occupancy_rate": occupancy.occupancy_rate(),
            "open_tickets": stats.open_tickets,
            "total_tickets": stats.total_tickets,
            "database_path": storage.path(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        match &cmd.zone {
            Some(zone) => println!("lotk status (zone {zone})"),
            None => println!("lotk status"),
        }
        println!("-----------");
        println!("Spaces:        {}", occupancy.total);
        println!("Available:     {}", occupancy.available);
        println!("Occupied:      {}", occupancy.occupied);
        println!("Reserved:      {}", occupancy.reserved);
        println!("Maintenance:   {}", occupancy.maintenance);
        println!("Occupancy:     {}%", occupancy.occupancy_rate());
        println!();
        println!("Open tickets:  {}", stats.open_tickets);
        println!("All tickets:   {}", stats.total_tickets);
        println!("Database:      {}", storage.path().display());
        if stats.db_size_bytes > 0 {
            println!("Size:          {} KiB", stats.db_size_bytes / 1024);
        }
    }
    Ok(())
}

fn handle_activity(storage: &Storage, cmd: &ActivityCommand) -> Result<()> {
    let activity = storage.recent_activity(cmd.limit)?;

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&activity)?),
        OutputFormat::Table => {
            println!(
                "{:<20} {:<10} {:<14} {:<12} {:<6}",
                "TIME", "EVENT", "TICKET", "PLATE", "SPACE"
            );
            for event in &activity {
                println!(
                    "{:<20} {:<10} {:<14} {:<12} {:<6}",
                    format_time(event.at),
                    event.kind.to_string(),
                    event.ticket_id.to_string(),
                    event.plate,
                    event.space
                );
            }
        }
        OutputFormat::Plain => {
            for event in &activity {
                println!(
                    "{} {} {} ({}, space {})",
                    format_time(event.at),
                    event.kind,
                    event.plate,
                    event.ticket_id,
                    event.space
                );
            }
        }
    }
    if activity.is_empty() && cmd.format != OutputFormat::Json {
        println!("No activity yet.");
    }
    Ok(())
}

fn handle_report(
    storage: &Storage,
    config: &Config,
    cmd: &ReportCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    let report = build_report(storage, cmd.period.into(), now)?;
    let symbol = &config.fees.currency_symbol;

    if cmd.stdout {
        print!("{}", report.to_csv(symbol));
        return Ok(());
    }

    let dir = cmd.output.clone().unwrap_or_else(|| config.report_dir());
    let path = report
        .write_to_dir(&dir, symbol)
        .with_context(|| format!("failed to write report to {}", dir.display()))?;
    println!("Report written to {}", path.display());
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Fees]");
                println!(
                    "  Hourly rate:        {}",
                    config.format_money(Money::from_cents(config.fees.hourly_rate_cents))
                );
                println!(
                    "  Minimum fee:        {}",
                    config.format_money(Money::from_cents(config.fees.minimum_fee_cents))
                );
                println!();
                println!("[Lot]");
                println!(
                    "  Plate pattern:      {}",
                    config.lot.plate_pattern.as_deref().unwrap_or("(any)")
                );
                println!();
                println!("[Report]");
                println!("  Output directory:   {}", config.report_dir().display());
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

fn print_ticket(ticket: &Ticket, config: &Config) {
    let vehicle = ticket.vehicle();
    println!("Ticket:        {}", ticket.id());
    println!("Plate:         {}", vehicle.plate);
    println!("Owner:         {}", vehicle.owner_name);
    println!("Model:         {}", vehicle.model);
    println!("Space:         {}", ticket.space());
    println!("Checked in:    {}", format_time(ticket.check_in_time()));
    match ticket.state() {
        TicketState::Open => println!("State:         open"),
        TicketState::Closed {
            check_out_time,
            fee,
        } => {
            println!("Checked out:   {}", format_time(*check_out_time));
            println!("Fee:           {}", config.format_money(*fee));
        }
    }
}

fn print_spaces(spaces: &[Space], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(spaces)?),
        OutputFormat::Table => {
            println!(
                "{:<6} {:<5} {:<10} {:<12} DESCRIPTION",
                "SPACE", "ZONE", "KIND", "STATUS"
            );
            for space in spaces {
                println!(
                    "{:<6} {:<5} {:<10} {:<12} {}",
                    space.id,
                    space.zone,
                    space.kind.to_string(),
                    space.status.to_string(),
                    space.description.as_deref().unwrap_or("")
                );
            }
        }
        OutputFormat::Plain => {
            for space in spaces {
                println!("{} {}", space.id, space.status);
            }
        }
    }
    Ok(())
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
