pub struct SymbolConfig {
    pub default: &'static str,
    pub supported: &'static [&'static str],
}

pub const SYMBOLS: SymbolConfig = SymbolConfig {
    default: "BTCUSDT",
    supported: &["BTCUSDT", "ETHUSDT"],
};

impl SymbolConfig {
    pub fn is_supported(&self, symbol: &str) -> bool {
        self.supported.contains(&symbol)
    }
}
