//! Fixed table names in the store.

/// Raw entity attributes
pub const ENTITIES: &str = "entities";
/// Raw pairwise outcomes
pub const OUTCOMES: &str = "outcomes";

pub const OUTCOMES_NAMED: &str = "outcomes_named";
pub const ENTITY_STATS: &str = "entity_stats";
pub const TOP_WINS: &str = "top_wins";
pub const TOP_LOSSES: &str = "top_losses";
pub const TOP_WIN_RATE: &str = "top_win_rate";
pub const TOP_WINNER_ATTRIBUTES: &str = "top_winner_attributes";
pub const ATTRIBUTE_COMPARISON: &str = "attribute_comparison";
pub const ATTRIBUTE_WIN_CORRELATION: &str = "attribute_win_correlation";
pub const WIN_RATE_DISTRIBUTION: &str = "win_rate_distribution";
pub const CATEGORY_RANKING: &str = "category_ranking";
