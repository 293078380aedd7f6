pub mod audit;
pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod flows;

pub use cpq::catalog::Catalog;
pub use cpq::currency::{
    Clock, CurrencyConverter, CurrencySettings, ExchangeRate, RateSnapshot, RateSource,
    SystemClock,
};
pub use cpq::rules::ProductRuleSet;
pub use cpq::{CpqEvaluation, CpqRuntime, DeterministicCpqRuntime, PricingSubject};
pub use domain::order::{CustomerContact, OrderReceipt, OrderSubmission, PaymentType, StagedOrder};
pub use domain::product::{Dimensions, Product, ProductId};
pub use domain::quote::{DimensionRequest, FlapCount, FlapSet, PriceQuote};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{ConfiguratorMode, ConfiguratorSession, SessionAction, SessionEvent};
