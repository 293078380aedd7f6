use hatchquote_client::currency::HttpRateSource;
use hatchquote_core::config::{AppConfig, LoadOptions};
use hatchquote_core::cpq::currency::{
    Clock, CurrencyConverter, RateSnapshot, RateSource, SystemClock, REFERENCE_CURRENCY,
};

use super::{block_on, to_data, CommandResult, EXIT_UPSTREAM};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("rate", error),
    };
    let source = match HttpRateSource::from_config(&config.currency) {
        Ok(source) => source,
        Err(error) => return CommandResult::config_failure("rate", error),
    };

    let converter = CurrencyConverter::new(source, SystemClock, config.currency.converter_settings());
    match block_on(converter.current_rate()) {
        Ok(snapshot) => report(&converter, &snapshot),
        Err(error) => CommandResult::failure("rate", "runtime", error.to_string(), EXIT_UPSTREAM),
    }
}

/// A fallback rate is still a usable answer, so it reports `ok` with the cause attached.
pub fn report<S, C>(converter: &CurrencyConverter<S, C>, snapshot: &RateSnapshot) -> CommandResult
where
    S: RateSource,
    C: Clock,
{
    let currency = &converter.settings().display_currency;
    let mut message = format!("1 {REFERENCE_CURRENCY} = {} {currency}", snapshot.rate);
    if snapshot.is_fallback {
        let cause = snapshot.error.as_deref().unwrap_or("rate source unavailable");
        message.push_str(&format!(" (fallback rate: {cause})"));
    }
    CommandResult::success_with_data("rate", message, to_data(snapshot))
}
