use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::cpq::catalog::minimum_dimensions;
use crate::cpq::constraints::{generic_allowed_flaps, Adjustment, DeterministicConstraintEngine};
use crate::cpq::currency::{Clock, CurrencyConverter, RateSnapshot, RateSource};
use crate::cpq::pricing::DeterministicPricingEngine;
use crate::cpq::{CpqRuntime, DeterministicCpqRuntime, PricingSubject};
use crate::domain::order::StagedOrder;
use crate::domain::product::{Dimensions, Product};
use crate::domain::quote::{DimensionRequest, FlapCount, FlapSet, PriceQuote};
use crate::errors::DomainError;
use crate::flows::states::{
    ConfiguratorMode, SessionAction, SessionEvent, SessionEventKind, TransitionOutcome,
};

/// A freshly selected catalog size above this perimeter defaults to two flaps.
pub const DOUBLE_FLAP_DEFAULT_PERIMETER: u32 = 200;

pub type DefaultCpqRuntime =
    DeterministicCpqRuntime<DeterministicConstraintEngine, DeterministicPricingEngine>;

/// Mutable configurator state for one product.
///
/// The session never prices anything itself. It feeds the current inputs to a
/// [`CpqRuntime`] and keeps the last accepted quote, dropping it whenever an
/// input the quote depends on changes in manual-quote mode.
pub struct ConfiguratorSession<R = DefaultCpqRuntime> {
    product: Product,
    runtime: R,
    mode: ConfiguratorMode,
    size_index: Option<usize>,
    dimensions: Dimensions,
    flap_count: FlapCount,
    installation_is_ceiling: bool,
    quantity: i32,
    last_quote: Option<PriceQuote>,
    recalculation_required: bool,
    manual_quote_reason: Option<String>,
}

impl ConfiguratorSession {
    pub fn for_product(product: Product) -> Self {
        Self::new(product, DeterministicCpqRuntime::default())
    }
}

impl<R> ConfiguratorSession<R>
where
    R: CpqRuntime,
{
    pub fn new(product: Product, runtime: R) -> Self {
        let mode = if product.sizes.is_empty() {
            custom_mode_for(&product, false)
        } else {
            ConfiguratorMode::StandardSize
        };
        let dimensions = minimum_dimensions(&product);
        Self {
            product,
            runtime,
            mode,
            size_index: None,
            dimensions,
            flap_count: FlapCount::One,
            installation_is_ceiling: false,
            quantity: 1,
            last_quote: None,
            recalculation_required: false,
            manual_quote_reason: None,
        }
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn mode(&self) -> ConfiguratorMode {
        self.mode
    }

    pub fn size_index(&self) -> Option<usize> {
        self.size_index
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn flap_count(&self) -> FlapCount {
        self.flap_count
    }

    pub fn installation_is_ceiling(&self) -> bool {
        self.installation_is_ceiling
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    pub fn quote(&self) -> Option<&PriceQuote> {
        self.last_quote.as_ref()
    }

    pub fn recalculation_required(&self) -> bool {
        self.recalculation_required
    }

    pub fn manual_quote_reason(&self) -> Option<&str> {
        self.manual_quote_reason.as_deref()
    }

    /// Flap counts the current product allows at the current dimensions.
    pub fn allowed_flaps(&self) -> FlapSet {
        match PricingSubject::of(&self.product) {
            PricingSubject::Special(rules) => rules.allowed_flaps(&self.dimensions),
            PricingSubject::Generic(product) => {
                generic_allowed_flaps(product, self.dimensions.perimeter())
            }
        }
    }

    /// Unit price times quantity, in the reference currency.
    pub fn total(&self) -> Option<Decimal> {
        self.last_quote.as_ref().map(|quote| quote.total(self.quantity))
    }

    pub fn display_total<S, C>(
        &self,
        converter: &CurrencyConverter<S, C>,
        rate: &RateSnapshot,
    ) -> Option<Decimal>
    where
        S: RateSource,
        C: Clock,
    {
        self.total().map(|total| converter.to_display(total, rate))
    }

    /// Quote present, positive quantity, and over-limit quotes only in manual-quote mode.
    pub fn order_ready(&self) -> bool {
        self.last_quote.as_ref().is_some_and(|quote| {
            self.quantity > 0
                && (!quote.is_over_limit
                    || self.mode == ConfiguratorMode::CustomOrderWithManualQuote)
        })
    }

    /// Applies one input event.
    ///
    /// When a recompute fails validation the new input is kept, the quote is
    /// cleared and the validation error is returned.
    pub fn apply(&mut self, event: &SessionEvent) -> Result<TransitionOutcome, DomainError> {
        let from = self.mode;
        let mut actions = Vec::new();

        match event {
            SessionEvent::SelectSize { index } => self.select_size(*index, &mut actions)?,
            SessionEvent::EnterCustomDimensions { width, height } => {
                self.enter_custom_dimensions(Dimensions::new(*width, *height), &mut actions)?;
            }
            SessionEvent::ToggleCustomOrder { enabled } => {
                self.toggle_custom_order(*enabled, &mut actions)?;
            }
            SessionEvent::SetFlapCount { flap_count } => {
                self.set_flap_count(*flap_count, &mut actions)?;
            }
            SessionEvent::SetCeiling { installation_is_ceiling } => {
                self.set_ceiling(*installation_is_ceiling, &mut actions)?;
            }
            SessionEvent::SetQuantity { quantity } => self.quantity = *quantity,
            SessionEvent::Calculate => {
                if !self.mode.is_custom() {
                    return Err(DomainError::InvalidSessionTransition {
                        mode: self.mode,
                        event: SessionEventKind::Calculate,
                    });
                }
                self.calculate(&mut actions)?;
            }
            SessionEvent::StageOrder => {
                let order = StagedOrder::from_session(self)?;
                info!(
                    event_name = "session.order_staged",
                    product_id = %order.product_id,
                    quantity = order.quantity,
                    total = %order.total_price(),
                    requires_manual_quote = order.requires_manual_quote,
                    "configuration staged for checkout"
                );
                actions.push(SessionAction::OrderStaged { order });
            }
        }

        debug!(
            event_name = "session.event_applied",
            product_id = %self.product.id,
            event = ?event.kind(),
            from = ?from,
            to = ?self.mode,
            actions = actions.len(),
            "configurator event applied"
        );

        Ok(TransitionOutcome { from, to: self.mode, event: event.kind(), actions })
    }

    pub fn apply_with_audit<S>(
        &mut self,
        event: &SessionEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, DomainError>
    where
        S: AuditSink,
    {
        let result = self.apply(event);
        match &result {
            Ok(outcome) => {
                for action in &outcome.actions {
                    if let Some(audit_event) = self.audit_event_for(action, audit) {
                        sink.emit(audit_event);
                    }
                }
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        Some(self.product.id.clone()),
                        audit,
                        "session.event_rejected",
                        AuditCategory::Session,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("event", format!("{:?}", event.kind()))
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    fn select_size(
        &mut self,
        index: usize,
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), DomainError> {
        let dimensions = self
            .product
            .size(index)
            .map(|size| size.dimensions)
            .ok_or_else(|| DomainError::UnknownSize { product_id: self.product.id.clone(), index })?;
        let quote = self.runtime.price_size(&self.product, index, self.installation_is_ceiling)?;

        self.mode = ConfiguratorMode::StandardSize;
        self.size_index = Some(index);
        self.dimensions = dimensions;
        self.recalculation_required = false;
        self.manual_quote_reason = None;

        let preferred = if dimensions.perimeter() > DOUBLE_FLAP_DEFAULT_PERIMETER {
            FlapCount::Two
        } else {
            FlapCount::One
        };
        let allowed = self.allowed_flaps();
        let default_flaps = if allowed.contains(preferred) {
            preferred
        } else {
            allowed.first().unwrap_or(preferred)
        };
        if default_flaps != self.flap_count {
            self.flap_count = default_flaps;
            actions.push(SessionAction::FlapCountDefaulted { flap_count: default_flaps });
        }

        self.store_quote(quote, actions);
        Ok(())
    }

    fn enter_custom_dimensions(
        &mut self,
        dimensions: Dimensions,
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), DomainError> {
        if self.mode.is_custom() {
            if dimensions == self.dimensions {
                return Ok(());
            }
        } else {
            self.mode = custom_mode_for(&self.product, false);
            self.size_index = None;
        }
        self.dimensions = dimensions;
        self.custom_input_changed(actions)
    }

    fn toggle_custom_order(
        &mut self,
        enabled: bool,
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), DomainError> {
        let target = custom_mode_for(&self.product, enabled);
        if target == self.mode {
            return Ok(());
        }
        self.mode = target;
        self.size_index = None;
        self.custom_input_changed(actions)
    }

    fn set_flap_count(
        &mut self,
        flap_count: FlapCount,
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), DomainError> {
        if flap_count == self.flap_count {
            return Ok(());
        }
        if self.mode.is_custom() {
            self.flap_count = flap_count;
            return self.custom_input_changed(actions);
        }

        // Catalog sizes are never re-validated by Calculate, so legality is enforced here.
        let allowed = self.allowed_flaps();
        let accepted = match allowed.first() {
            Some(first) if !allowed.contains(flap_count) => {
                actions.push(SessionAction::Adjusted {
                    adjustment: Adjustment::ForcedFlapCount { from: flap_count, to: first },
                });
                first
            }
            _ => flap_count,
        };
        self.flap_count = accepted;
        Ok(())
    }

    /// Ceiling installation is a flat addend, so an existing quote is recomputed
    /// in place instead of being invalidated.
    fn set_ceiling(
        &mut self,
        installation_is_ceiling: bool,
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), DomainError> {
        if installation_is_ceiling == self.installation_is_ceiling {
            return Ok(());
        }
        self.installation_is_ceiling = installation_is_ceiling;

        match self.mode {
            ConfiguratorMode::StandardSize => {
                if let Some(index) = self.size_index {
                    let quote = self.runtime.price_size(&self.product, index, installation_is_ceiling)?;
                    self.store_quote(quote, actions);
                }
                Ok(())
            }
            ConfiguratorMode::CustomContinuousSize => self.calculate(actions),
            ConfiguratorMode::CustomOrderWithManualQuote => {
                if self.last_quote.is_some() {
                    self.calculate(actions)?;
                }
                Ok(())
            }
        }
    }

    fn custom_input_changed(&mut self, actions: &mut Vec<SessionAction>) -> Result<(), DomainError> {
        match self.mode {
            ConfiguratorMode::CustomContinuousSize => self.calculate(actions),
            _ => {
                self.drop_quote(actions);
                Ok(())
            }
        }
    }

    fn calculate(&mut self, actions: &mut Vec<SessionAction>) -> Result<(), DomainError> {
        let request = DimensionRequest::new(
            self.dimensions.width,
            self.dimensions.height,
            self.flap_count,
        )
        .with_ceiling(self.installation_is_ceiling)
        .with_quantity(self.quantity);

        let evaluation = self.runtime.evaluate(PricingSubject::of(&self.product), &request);
        match evaluation {
            Ok(evaluation) => {
                let validation = evaluation.validation;
                actions.extend(
                    validation
                        .adjustments
                        .iter()
                        .cloned()
                        .map(|adjustment| SessionAction::Adjusted { adjustment }),
                );
                self.dimensions = validation.dimensions;
                self.flap_count = validation.flap_count;
                self.manual_quote_reason = None;

                match evaluation.quote {
                    Some(quote) => self.store_quote(quote, actions),
                    None => {
                        self.drop_quote(actions);
                        self.recalculation_required = true;
                        actions.push(SessionAction::RecalculationRequired);
                    }
                }
                Ok(())
            }
            Err(error) if error.requires_manual_quote() => {
                self.drop_quote(actions);
                let reason = error.to_string();
                info!(
                    event_name = "session.manual_quote_required",
                    product_id = %self.product.id,
                    dimensions = %self.dimensions,
                    reason = %reason,
                    "configuration needs a manual quote"
                );
                self.manual_quote_reason = Some(reason.clone());
                actions.push(SessionAction::ManualQuoteRequired { reason });
                Ok(())
            }
            Err(error) => {
                self.drop_quote(actions);
                Err(error)
            }
        }
    }

    fn store_quote(&mut self, quote: PriceQuote, actions: &mut Vec<SessionAction>) {
        actions.push(SessionAction::QuoteComputed { over_limit: quote.is_over_limit });
        self.recalculation_required = false;
        self.last_quote = Some(quote);
    }

    fn drop_quote(&mut self, actions: &mut Vec<SessionAction>) {
        if self.last_quote.take().is_some() {
            info!(
                event_name = "session.quote_invalidated",
                product_id = %self.product.id,
                dimensions = %self.dimensions,
                flap_count = self.flap_count.get(),
                "input changed, quote must be recalculated"
            );
            actions.push(SessionAction::QuoteInvalidated);
        }
    }

    fn audit_event_for(&self, action: &SessionAction, audit: &AuditContext) -> Option<AuditEvent> {
        let product_id = Some(self.product.id.clone());
        let event = match action {
            SessionAction::QuoteComputed { over_limit } => AuditEvent::new(
                product_id,
                audit,
                "session.quote_computed",
                AuditCategory::Pricing,
                AuditOutcome::Success,
            )
            .with_metadata(
                "price",
                self.last_quote
                    .as_ref()
                    .map(|quote| quote.price_in_reference_currency.to_string())
                    .unwrap_or_default(),
            )
            .with_metadata("over_limit", over_limit.to_string()),
            SessionAction::QuoteInvalidated => AuditEvent::new(
                product_id,
                audit,
                "session.quote_invalidated",
                AuditCategory::Session,
                AuditOutcome::Success,
            ),
            SessionAction::Adjusted { adjustment: Adjustment::ForcedFlapCount { from, to } } => {
                AuditEvent::new(
                    product_id,
                    audit,
                    "session.flap_count_forced",
                    AuditCategory::Session,
                    AuditOutcome::Success,
                )
                .with_metadata("from", from.to_string())
                .with_metadata("to", to.to_string())
            }
            SessionAction::ManualQuoteRequired { reason } => AuditEvent::new(
                product_id,
                audit,
                "session.manual_quote_required",
                AuditCategory::Pricing,
                AuditOutcome::Rejected,
            )
            .with_metadata("reason", reason.clone()),
            SessionAction::OrderStaged { order } => AuditEvent::new(
                product_id,
                audit,
                "session.order_staged",
                AuditCategory::Order,
                AuditOutcome::Success,
            )
            .with_metadata("quantity", order.quantity.to_string())
            .with_metadata("total", order.total_price().to_string())
            .with_metadata("requires_manual_quote", order.requires_manual_quote.to_string()),
            SessionAction::Adjusted { .. }
            | SessionAction::FlapCountDefaulted { .. }
            | SessionAction::RecalculationRequired => return None,
        };
        Some(event)
    }
}

impl StagedOrder {
    /// Snapshot of a priced session for checkout. Stale or missing quotes are rejected.
    pub fn from_session<R>(session: &ConfiguratorSession<R>) -> Result<Self, DomainError>
    where
        R: CpqRuntime,
    {
        let quote = session.quote().ok_or(DomainError::QuoteMissing)?;
        if session.quantity() <= 0 {
            return Err(DomainError::InvalidOrder {
                field: "quantity".to_owned(),
                message: "must be greater than zero".to_owned(),
            });
        }
        let is_custom_order = session.mode() == ConfiguratorMode::CustomOrderWithManualQuote;
        if quote.is_over_limit && !is_custom_order {
            return Err(DomainError::InvalidOrder {
                field: "size".to_owned(),
                message: "exceeds the supported size; switch to a custom order for a manual quote"
                    .to_owned(),
            });
        }

        let flap_count = session.flap_count();
        let allowed = session.allowed_flaps();
        if !allowed.contains(flap_count) {
            return Err(DomainError::InvalidOrder {
                field: "flapCount".to_owned(),
                message: format!("{flap_count} flap(s) not allowed here; allowed: {allowed}"),
            });
        }

        let dimensions = session.dimensions();
        Ok(Self {
            product_id: session.product().id.clone(),
            width: dimensions.width,
            height: dimensions.height,
            flap_count,
            quantity: session.quantity(),
            unit_price: quote.price_in_reference_currency,
            is_custom_order,
            requires_manual_quote: quote.is_over_limit,
        })
    }
}

/// Rule-table products always need an explicit Calculate.
fn custom_mode_for(product: &Product, custom_order: bool) -> ConfiguratorMode {
    if custom_order || PricingSubject::of(product).is_special() {
        ConfiguratorMode::CustomOrderWithManualQuote
    } else {
        ConfiguratorMode::CustomContinuousSize
    }
}
