use chrono::Duration;
use clap::Args;
use hatchquote_client::catalog::{CatalogService, HttpCatalogSource};
use hatchquote_core::audit::{AuditContext, InMemoryAuditSink};
use hatchquote_core::config::{AppConfig, LoadOptions};
use hatchquote_core::cpq::constraints::Adjustment;
use hatchquote_core::cpq::currency::SystemClock;
use hatchquote_core::cpq::rules::ProductRuleSet;
use hatchquote_core::domain::product::{Dimensions, Product, ProductId};
use hatchquote_core::domain::quote::{FlapCount, PricingTraceStep};
use hatchquote_core::errors::{ApplicationError, InterfaceError};
use hatchquote_core::flows::{ConfiguratorSession, SessionAction, SessionEvent};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use super::{block_on, to_data, CommandResult, EXIT_UPSTREAM, EXIT_VALIDATION};

#[derive(Debug, Clone, Args)]
pub struct QuoteArgs {
    #[arg(long, help = "Product id; built-in rule tables are priced offline")]
    pub product: String,
    #[arg(long, help = "Width in centimetres")]
    pub width: u32,
    #[arg(long, help = "Height in centimetres")]
    pub height: u32,
    #[arg(long, default_value_t = 1, help = "Number of flaps (1-3)")]
    pub flaps: u8,
    #[arg(long, help = "Price for ceiling installation")]
    pub ceiling: bool,
    #[arg(long, default_value_t = 1)]
    pub quantity: i32,
    #[arg(long, help = "Include adjustments and the pricing trace")]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct QuoteReport {
    product_id: ProductId,
    dimensions: Dimensions,
    flap_count: FlapCount,
    installation_is_ceiling: bool,
    quantity: i32,
    unit_price_usd: Decimal,
    total_usd: Decimal,
    is_over_limit: bool,
    adjustments: Vec<Adjustment>,
    trace: Vec<PricingTraceStep>,
    correlation_id: String,
    audit_events: Vec<String>,
}

pub fn run(args: &QuoteArgs, options: LoadOptions) -> CommandResult {
    let audit = AuditContext::generated("hatchquote-cli");
    let product_id = ProductId::from(args.product.trim());
    let product = match ProductRuleSet::for_product(&product_id) {
        Some(rules) => rule_set_product(rules),
        None => match fetch_product(&product_id, options, &audit) {
            Ok(product) => product,
            Err(result) => return result,
        },
    };
    price(product, args, &audit)
}

/// Drives an audited configurator session through one explicit Calculate,
/// repeating it once when the panel was re-oriented.
pub fn price(product: Product, args: &QuoteArgs, audit: &AuditContext) -> CommandResult {
    let flap_count = match FlapCount::try_from(args.flaps) {
        Ok(flap_count) => flap_count,
        Err(error) => return interface_failure(error.into(), audit),
    };

    let sink = InMemoryAuditSink::default();
    let mut session = ConfiguratorSession::for_product(product);
    let inputs = [
        SessionEvent::ToggleCustomOrder { enabled: true },
        SessionEvent::SetQuantity { quantity: args.quantity },
        SessionEvent::SetCeiling { installation_is_ceiling: args.ceiling },
        SessionEvent::SetFlapCount { flap_count },
        SessionEvent::EnterCustomDimensions { width: args.width, height: args.height },
        SessionEvent::Calculate,
    ];

    let mut adjustments = Vec::new();
    for event in &inputs {
        match session.apply_with_audit(event, &sink, audit) {
            Ok(outcome) => adjustments.extend(adjusted(&outcome.actions)),
            Err(error) => return interface_failure(error.into(), audit),
        }
    }
    if session.recalculation_required() {
        match session.apply_with_audit(&SessionEvent::Calculate, &sink, audit) {
            Ok(outcome) => adjustments.extend(adjusted(&outcome.actions)),
            Err(error) => return interface_failure(error.into(), audit),
        }
    }

    if let Some(reason) = session.manual_quote_reason() {
        return CommandResult::failure("quote", "manual_quote_required", reason, EXIT_VALIDATION);
    }
    let Some(quote) = session.quote() else {
        return CommandResult::failure(
            "quote",
            "not_computable",
            "no price could be computed for this configuration",
            EXIT_VALIDATION,
        );
    };

    let report = QuoteReport {
        product_id: quote.product_id.clone(),
        dimensions: session.dimensions(),
        flap_count: session.flap_count(),
        installation_is_ceiling: session.installation_is_ceiling(),
        quantity: session.quantity(),
        unit_price_usd: quote.price_in_reference_currency,
        total_usd: quote.total(session.quantity()),
        is_over_limit: quote.is_over_limit,
        adjustments,
        trace: quote.trace.clone(),
        correlation_id: audit.correlation_id.clone(),
        audit_events: sink.event_types(),
    };

    info!(
        event_name = "cli.quote_priced",
        correlation_id = %report.correlation_id,
        product_id = %report.product_id,
        dimensions = %report.dimensions,
        total = %report.total_usd,
        "quote priced"
    );

    let mut message = format!(
        "{} with {} flap(s): {} USD x {} = {} USD",
        report.dimensions,
        report.flap_count,
        report.unit_price_usd,
        report.quantity,
        report.total_usd
    );
    if report.is_over_limit {
        message.push_str(" (over limit, manual quote required)");
    }

    let data = if args.json { to_data(&report) } else { None };
    CommandResult::success_with_data("quote", message, data)
}

fn adjusted(actions: &[SessionAction]) -> impl Iterator<Item = Adjustment> + '_ {
    actions.iter().filter_map(|action| match action {
        SessionAction::Adjusted { adjustment } => Some(adjustment.clone()),
        _ => None,
    })
}

fn rule_set_product(rules: ProductRuleSet) -> Product {
    Product {
        id: ProductId::from(rules.product_id()),
        name: format!("{rules:?}"),
        category: "revision-hatch".to_owned(),
        base_price: Decimal::ZERO,
        sizes: Vec::new(),
        perimeter_pricing: Vec::new(),
        minimum_dimensions: None,
    }
}

fn fetch_product(
    product_id: &ProductId,
    options: LoadOptions,
    audit: &AuditContext,
) -> Result<Product, CommandResult> {
    let config =
        AppConfig::load(options).map_err(|error| CommandResult::config_failure("quote", error))?;
    let source = HttpCatalogSource::from_config(&config.catalog)
        .map_err(|error| CommandResult::config_failure("quote", error))?;
    let ttl = Duration::seconds(i64::try_from(config.catalog.cache_ttl_secs).unwrap_or(i64::MAX));
    let service = CatalogService::new(source, SystemClock, ttl);

    let fetched = block_on(service.product_by_id(product_id)).map_err(|error| {
        CommandResult::failure("quote", "runtime", error.to_string(), EXIT_UPSTREAM)
    })?;
    fetched.map_err(|error| interface_failure(error, audit))
}

/// Domain failures become `validation`, collaborator failures `upstream_unavailable`.
fn interface_failure(error: ApplicationError, audit: &AuditContext) -> CommandResult {
    let interface = error.into_interface(audit.correlation_id.as_str());
    let (error_class, exit_code) = match &interface {
        InterfaceError::BadRequest { .. } => ("validation", EXIT_VALIDATION),
        InterfaceError::ServiceUnavailable { .. } => ("upstream_unavailable", EXIT_UPSTREAM),
        InterfaceError::Internal { .. } => ("internal", EXIT_UPSTREAM),
    };
    let message = format!("{interface} (correlation id {})", audit.correlation_id);
    CommandResult::failure("quote", error_class, message, exit_code)
}
