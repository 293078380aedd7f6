use serde::{Deserialize, Serialize};

use crate::cpq::constraints::Adjustment;
use crate::domain::order::StagedOrder;
use crate::domain::quote::FlapCount;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfiguratorMode {
    /// A discrete catalog size is selected and priced from the catalog.
    StandardSize,
    /// Custom dimensions, re-priced on every input change.
    CustomContinuousSize,
    /// Custom dimensions priced only on an explicit Calculate.
    CustomOrderWithManualQuote,
}

impl ConfiguratorMode {
    pub fn is_custom(self) -> bool {
        !matches!(self, Self::StandardSize)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SelectSize { index: usize },
    EnterCustomDimensions { width: u32, height: u32 },
    ToggleCustomOrder { enabled: bool },
    SetFlapCount { flap_count: FlapCount },
    SetCeiling { installation_is_ceiling: bool },
    SetQuantity { quantity: i32 },
    Calculate,
    StageOrder,
}

impl SessionEvent {
    pub fn kind(&self) -> SessionEventKind {
        match self {
            Self::SelectSize { .. } => SessionEventKind::SelectSize,
            Self::EnterCustomDimensions { .. } => SessionEventKind::EnterCustomDimensions,
            Self::ToggleCustomOrder { .. } => SessionEventKind::ToggleCustomOrder,
            Self::SetFlapCount { .. } => SessionEventKind::SetFlapCount,
            Self::SetCeiling { .. } => SessionEventKind::SetCeiling,
            Self::SetQuantity { .. } => SessionEventKind::SetQuantity,
            Self::Calculate => SessionEventKind::Calculate,
            Self::StageOrder => SessionEventKind::StageOrder,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    SelectSize,
    EnterCustomDimensions,
    ToggleCustomOrder,
    SetFlapCount,
    SetCeiling,
    SetQuantity,
    Calculate,
    StageOrder,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SessionAction {
    QuoteComputed { over_limit: bool },
    QuoteInvalidated,
    Adjusted { adjustment: Adjustment },
    FlapCountDefaulted { flap_count: FlapCount },
    RecalculationRequired,
    ManualQuoteRequired { reason: String },
    OrderStaged { order: StagedOrder },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub from: ConfiguratorMode,
    pub to: ConfiguratorMode,
    pub event: SessionEventKind,
    pub actions: Vec<SessionAction>,
}

impl TransitionOutcome {
    pub fn staged_order(&self) -> Option<&StagedOrder> {
        self.actions.iter().find_map(|action| match action {
            SessionAction::OrderStaged { order } => Some(order),
            _ => None,
        })
    }

    pub fn invalidated_quote(&self) -> bool {
        self.actions.contains(&SessionAction::QuoteInvalidated)
    }
}
