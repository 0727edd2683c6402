//! Static descriptions for known feature names: formula plus why a trader
//! would care. Lookup is by exact name.

pub const FALLBACK_EXPLANATION: &str = "Technical indicator for market analysis.";

pub static EXPLANATIONS: &[(&str, &str)] = &[
    // --- base ---
    ("price_open", "Opening price of the bar. Anchors intrabar moves against where the period started."),
    ("price_high", "Highest traded price of the bar. Marks the upper extent buyers managed to push."),
    ("price_low", "Lowest traded price of the bar. Marks the lower extent sellers managed to push."),
    ("price_close", "Closing price of the bar. The reference price most other indicators are built on."),
    ("volume", "Total traded volume in the bar. Confirms whether a price move has participation behind it."),
    ("buy_volume", "Volume of trades that lifted the ask. Measures aggressive buying."),
    ("sell_volume", "Volume of trades that hit the bid. Measures aggressive selling."),
    ("buy_pressure", "buy_volume / volume. Share of activity driven by buyers; above 0.5 means buyers dominate."),
    ("sell_pressure", "sell_volume / volume. Share of activity driven by sellers; above 0.5 means sellers dominate."),
    ("trade_count", "Number of trades in the bar. Separates a few large prints from broad participation."),
    ("spread", "best_ask - best_bid. Cost of crossing the book; widens when liquidity thins out."),
    ("mid_price", "(best_ask + best_bid) / 2. Fair-value estimate between the two sides of the book."),
    ("order_imbalance", "(bid_size - ask_size) / (bid_size + ask_size). Positive when resting demand outweighs supply."),
    // --- engineering: named derived features ---
    ("cumulative_delta", "Running sum of buy_volume - sell_volume. Rising while price is flat hints at absorption before a move."),
    ("net_volume", "buy_volume - sell_volume for the bar. Direction and size of aggressive flow."),
    ("buy_dominance", "buy_volume / (buy_volume + sell_volume) over the session. Persistent readings above 0.5 show sustained buyer control."),
    ("buy_sell_ratio", "buy_volume / sell_volume. Values well above 1 flag one-sided buying, below 1 one-sided selling."),
    ("rolling_high", "Highest close over the lookback window. Defines the level a breakout has to clear."),
    ("rolling_high_distance", "(rolling_high - price_close) / rolling_high. How far price sits below the recent ceiling."),
    ("rolling_high_breakout", "1 when price_close exceeds the previous rolling_high, else 0. Flags fresh breakouts."),
    ("rolling_high_age", "Bars since rolling_high was set. Old highs are weaker resistance than fresh ones."),
    // --- engineering: windowed variants ---
    ("price_close_ma_5", "Mean of price_close over 5 bars. Short-term trend baseline."),
    ("price_close_ma_20", "Mean of price_close over 20 bars. Medium-term trend baseline."),
    ("buy_pressure_ma_5", "Mean of buy_pressure over 5 bars. Smooths single-bar noise in buyer share."),
    ("buy_pressure_ma_20", "Mean of buy_pressure over 20 bars. Slow-moving read of who controls the tape."),
    ("volume_ma_20", "Mean of volume over 20 bars. Baseline for judging whether current volume is unusual."),
    ("volume_spike", "volume / volume_ma_20. Readings above 2 mark bursts of participation that often precede moves."),
    ("price_trend_10", "Slope of a linear fit to price_close over 10 bars. Sign gives direction, size gives strength."),
    ("trade_count_10", "Trades summed over the last 10 bars. Rolling activity level."),
    ("price_velocity", "price_close - previous price_close. First derivative of price."),
    ("price_acceleration", "price_velocity - previous price_velocity. Detects moves that are speeding up or stalling."),
    ("pressure_flip", "1 when buy_pressure crosses 0.5 in either direction, else 0. Marks changes in control."),
    ("price_roc_5", "(price_close / price_close 5 bars ago) - 1. Momentum over a fixed window."),
    ("threshold_approach", "Distance of price from the target threshold, in percent. Shrinks as the move nears completion."),
];

pub fn lookup(name: &str) -> Option<&'static str> {
    EXPLANATIONS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, text)| *text)
}
