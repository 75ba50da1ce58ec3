//! Command handlers

use anyhow::{Context, bail};
use chrono::{Local, NaiveDate};
use cita_client::{
    ApiGateway, AppointmentTabs, AppointmentTicket, BookingFlow, CardFormSubmission, ClientConfig,
    ClientError, ClientResult, ErrorCategory, FlowState, NetworkTransport, PaymentState,
    PaymentStep, ProcessingFlag, ProviderHandoff, SearchResultRow, Transport, WeeklySchedule,
};
use cita_client::availability::bucketize;
use shared::models::{AppointmentStatus, AvailabilityDay, BusinessSearchQuery, Slot};
use shared::money::format_amount;

use crate::cli::{BookArgs, Command, PaymentArgs};

pub struct AppContext {
    pub config: ClientConfig,
    pub gateway: ApiGateway<NetworkTransport>,
}

pub async fn run(ctx: &AppContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => login(ctx, &email, &password).await,
        Command::Logout => {
            ctx.gateway.logout();
            println!("Signed out");
            Ok(())
        }
        Command::Whoami => whoami(ctx).await,
        Command::Search { query, lat, lon } => search(ctx, query, lat.zip(lon)).await,
        Command::Business { slug } => business(ctx, &slug).await,
        Command::Availability {
            slug,
            service_id,
            date,
        } => availability(ctx, &slug, &service_id, date).await,
        Command::Book(args) => book(ctx, args).await,
        Command::Appointments { status } => appointments(ctx, status.map(Into::into)).await,
        Command::Ticket { appointment_id } => ticket(ctx, &appointment_id).await,
        Command::Pay {
            appointment_id,
            payment,
        } => pay(ctx, &appointment_id, payment).await,
    }
}

/// One line for the user; auth failures point at `cita login`
pub fn describe_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<ClientError>() {
        Some(ClientError::Unauthorized) => {
            "Your session has expired, sign in again with `cita login`".to_string()
        }
        Some(e) if e.category() == ErrorCategory::Transport => {
            format!("Could not reach the booking service: {}", e)
        }
        _ => format!("{:#}", error),
    }
}

// ========== Account ==========

async fn login(ctx: &AppContext, email: &str, password: &str) -> anyhow::Result<()> {
    let response = ctx.gateway.login(email, password).await?;
    println!(
        "Signed in as {}",
        response.user_email.as_deref().unwrap_or(email)
    );
    if let Some(target) = ctx.gateway.session().take_redirect() {
        println!("Continue with: {}", target);
    }
    Ok(())
}

async fn whoami(ctx: &AppContext) -> anyhow::Result<()> {
    require_session(ctx)?;
    let profile = ctx.gateway.me().await?;
    println!("{}", profile.full_name.as_deref().unwrap_or(&profile.email));
    println!("  email: {}", profile.email);
    if ctx.gateway.session().is_staff() {
        println!("  role:  staff");
    }
    Ok(())
}

fn require_session(ctx: &AppContext) -> anyhow::Result<()> {
    if !ctx.gateway.session().is_authenticated() {
        bail!(
            "Sign in first with `cita login` ({})",
            ctx.gateway.session().login_target(None)
        );
    }
    Ok(())
}

// ========== Discovery ==========

async fn search(
    ctx: &AppContext,
    query: Option<String>,
    point: Option<(f64, f64)>,
) -> anyhow::Result<()> {
    let mut search = BusinessSearchQuery {
        q: query,
        ..Default::default()
    };
    if let Some((lat, lon)) = point {
        search = search.near(lat, lon);
    }
    let results = ctx.gateway.search_businesses(&search).await?;
    if results.is_empty() {
        println!("No businesses found");
        return Ok(());
    }
    for row in results.iter().map(SearchResultRow::from) {
        let distance = row.distance.map(|d| format!(" ({})", d)).unwrap_or_default();
        println!(
            "{:<28} {}{}",
            row.slug.as_deref().unwrap_or(&row.id),
            row.name,
            distance
        );
        if !row.address.is_empty() {
            println!("{:<28} {}", "", row.address);
        }
    }
    Ok(())
}

async fn business(ctx: &AppContext, slug: &str) -> anyhow::Result<()> {
    let business = ctx.gateway.business(slug).await?;
    println!("{}", business.name);
    if let Some(address) = &business.address {
        println!("{}", address);
    }

    let week = WeeklySchedule::from_schedules(&business.schedules);
    let today = week.today(Local::now().date_naive());
    println!();
    println!("Today: {}", today.summary());
    for day in week.days() {
        println!("  {:<10} {}", day.name, day.summary());
    }

    println!();
    println!("Services:");
    for service in &business.services {
        let duration = service
            .duration_minutes
            .map(|m| format!(" · {} min", m))
            .unwrap_or_default();
        println!(
            "  {:<8} {} · {}{} · deposit {}",
            service.id,
            service.name,
            format_amount(service.price),
            duration,
            format_amount(service.minimum_deposit(&business))
        );
    }
    Ok(())
}

async fn availability(
    ctx: &AppContext,
    slug: &str,
    service_id: &str,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let flow = BookingFlow::open(ctx.gateway.clone(), slug, service_id, &ctx.config).await?;
    let days = load_days(flow, date).await?;
    if days.iter().all(|d| !d.has_slots()) {
        println!("{}", no_availability(&ctx.config, date));
        return Ok(());
    }
    for day in &days {
        print_day(ctx, day);
    }
    Ok(())
}

/// Query one date (or the default window) and close the flow on every outcome
async fn load_days<T: Transport>(
    mut flow: BookingFlow<T>,
    date: Option<NaiveDate>,
) -> ClientResult<Vec<AvailabilityDay>> {
    let result = flow.change_date(date).await.map(<[AvailabilityDay]>::to_vec);
    flow.close();
    result
}

fn no_availability(config: &ClientConfig, date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => format!("No availability on {}", date),
        None => format!("No availability in the {}", config.window_label()),
    }
}

fn print_day(ctx: &AppContext, day: &AvailabilityDay) {
    if !day.has_slots() {
        return;
    }
    println!("{} {}", day.date, day.day_name);
    for bucket in bucketize(&day.slots, ctx.config.bucket_policy) {
        if bucket.is_empty() {
            println!("  {}: -", bucket.label);
            continue;
        }
        let slots: Vec<String> = bucket.slots.iter().map(describe_slot).collect();
        println!("  {}: {}", bucket.label, slots.join("  "));
    }
}

fn describe_slot(slot: &Slot) -> String {
    let staff: Vec<&str> = slot
        .available_employees
        .iter()
        .map(|s| if s.name.is_empty() { s.id.as_str() } else { s.name.as_str() })
        .collect();
    format!("{} [{}]", slot.display_time(), staff.join(", "))
}

// ========== Booking ==========

async fn book(ctx: &AppContext, args: BookArgs) -> anyhow::Result<()> {
    require_session(ctx)?;
    let mut flow =
        BookingFlow::open(ctx.gateway.clone(), &args.slug, &args.service_id, &ctx.config).await?;
    let days = flow.change_date(args.date).await?;

    let (date, slot_time) = days
        .iter()
        .find_map(|day| {
            day.slots
                .iter()
                .find(|s| s.display_time() == args.time || s.time == args.time)
                .map(|s| (day.date, s.time.clone()))
        })
        .with_context(|| format!("No free slot at {}", args.time))?;

    let selection = flow.select_slot(date, &slot_time)?;
    let assigned = selection.staff_id.is_some();
    let options = describe_slot(&selection.slot);
    match &args.staff {
        Some(staff) => flow.select_staff(staff)?,
        None if !assigned => {
            bail!("Several staff members can take this slot, pick one with --staff: {}", options);
        }
        None => {}
    }

    let report = flow.advance_to_payment().await?;
    for error in &report.errors {
        tracing::warn!(error = %error, "Payment step loaded partially");
    }
    let step = flow
        .payment()
        .context("Payment step did not open")?;
    println!(
        "{} on {} at {}, minimum deposit {}",
        flow.service().name,
        date,
        args.time,
        format_amount(step.min_required())
    );

    if let Some(amount) = args.payment.amount {
        flow.set_amount(amount)?;
    }
    let mut state = flow.confirm(&args.payment.method).await?;

    if state == FlowState::AwaitingProviderConfirmation {
        let handoff = flow.payment().and_then(|p| awaiting_handoff(p.state()));
        match (handoff, card_submission(&args.payment)) {
            (Some(ProviderHandoff::EmbeddedForm { .. }), Some(submission)) => {
                state = flow.submit_provider_form(submission).await?;
            }
            (Some(handoff), _) => {
                print_handoff(&handoff);
                flow.cancel_provider_form()?;
            }
            (None, _) => {}
        }
    }

    let appointment_id = flow
        .payment()
        .and_then(PaymentStep::appointment_id)
        .map(str::to_string);
    match (state, appointment_id) {
        (FlowState::Done { appointment_id }, _) => {
            println!("Booked, appointment {}", appointment_id);
            print_ticket(ctx, &appointment_id).await?;
        }
        (_, Some(appointment_id)) => {
            println!(
                "Appointment {} is reserved; pay later with `cita pay {}`",
                appointment_id, appointment_id
            );
        }
        _ => {}
    }
    flow.close();
    Ok(())
}

async fn pay(ctx: &AppContext, appointment_id: &str, args: PaymentArgs) -> anyhow::Result<()> {
    require_session(ctx)?;
    let appointments = AppointmentTabs::new(ctx.gateway.my_appointments().await?);
    let appointment = appointments
        .find(appointment_id)
        .with_context(|| format!("Appointment {} not found", appointment_id))?;
    if appointment.status != AppointmentStatus::Pending {
        bail!("Appointment {} is {}", appointment_id, appointment.status);
    }

    let mut step = PaymentStep::for_existing(ctx.gateway.clone(), ProcessingFlag::new(), appointment);
    step.load().await;
    println!(
        "Outstanding deposit {}",
        format_amount(AppointmentTabs::outstanding_deposit(appointment))
    );
    if let Some(amount) = args.amount {
        step.set_amount(amount)?;
    }
    step.confirm(&args.method).await?;

    if let Some(handoff) = awaiting_handoff(step.state()) {
        match (&handoff, card_submission(&args)) {
            (ProviderHandoff::EmbeddedForm { .. }, Some(submission)) => {
                step.submit_provider_form(submission).await?;
            }
            _ => {
                print_handoff(&handoff);
                step.cancel_provider_form()?;
            }
        }
    }

    if step.is_done() {
        println!("Payment registered");
        print_ticket(ctx, appointment_id).await?;
    }
    Ok(())
}

fn awaiting_handoff(state: &PaymentState) -> Option<ProviderHandoff> {
    match state {
        PaymentState::AwaitingProviderConfirmation { handoff, .. } => Some(handoff.clone()),
        _ => None,
    }
}

fn card_submission(args: &PaymentArgs) -> Option<CardFormSubmission> {
    Some(CardFormSubmission {
        token: args.card_token.clone()?,
        payment_method_id: args.card_method.clone()?,
        issuer_id: args.issuer.clone(),
        installments: args.installments,
    })
}

fn print_handoff(handoff: &ProviderHandoff) {
    match handoff {
        ProviderHandoff::EmbeddedForm {
            payment_id,
            public_key,
            amount,
        } => {
            println!(
                "Payment {} needs card data for {} (provider key {})",
                payment_id,
                format_amount(*amount),
                public_key
            );
            println!("Tokenize the card and rerun with --card-token and --card-method");
        }
        ProviderHandoff::Redirect {
            payment_id,
            checkout_url,
        } => {
            println!("Complete payment {} at {}", payment_id, checkout_url);
        }
    }
}

// ========== My appointments ==========

async fn appointments(ctx: &AppContext, status: Option<AppointmentStatus>) -> anyhow::Result<()> {
    require_session(ctx)?;
    let tabs = AppointmentTabs::new(ctx.gateway.my_appointments().await?);

    let counts: Vec<String> = tabs
        .counts()
        .into_iter()
        .map(|(status, count)| format!("{} {}", status, count))
        .collect();
    println!("{}", counts.join(" · "));

    let statuses = match status {
        Some(status) => vec![status],
        None => AppointmentStatus::ALL.to_vec(),
    };
    for status in statuses {
        let items = tabs.tab(status);
        if items.is_empty() {
            continue;
        }
        println!();
        println!("{}:", status);
        for appointment in items {
            let ticket = AppointmentTicket::from(appointment);
            let owed = AppointmentTabs::outstanding_deposit(appointment);
            let owed = if owed > 0.0 {
                format!(" · deposit owed {}", format_amount(owed))
            } else {
                String::new()
            };
            println!(
                "  {} {} {} · {} · {}{}",
                appointment.id, ticket.date, ticket.time, ticket.service_name, ticket.business_name, owed
            );
        }
    }
    Ok(())
}

async fn ticket(ctx: &AppContext, appointment_id: &str) -> anyhow::Result<()> {
    require_session(ctx)?;
    print_ticket(ctx, appointment_id).await
}

async fn print_ticket(ctx: &AppContext, appointment_id: &str) -> anyhow::Result<()> {
    let tabs = AppointmentTabs::new(ctx.gateway.my_appointments().await?);
    let appointment = tabs
        .find(appointment_id)
        .with_context(|| format!("Appointment {} not found", appointment_id))?;
    let ticket = AppointmentTicket::from(appointment);
    println!();
    for (label, value) in ticket.lines() {
        println!("  {:<16} {}", label, value);
    }
    Ok(())
}
