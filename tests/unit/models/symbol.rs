use candlecast::models::Symbol;

#[test]
fn test_parse_and_display() {
    let symbol: Symbol = "BTC/USDT".parse().expect("valid symbol");
    assert_eq!(symbol.base(), "BTC");
    assert_eq!(symbol.quote(), "USDT");
    assert_eq!(symbol.to_string(), "BTC/USDT");
    assert_eq!(symbol.file_stem(), "BTC_USDT");
    assert_eq!(symbol.exchange_pair(), "BTCUSDT");
}

#[test]
fn test_rejects_malformed_symbols() {
    for input in ["BTCUSDT", "btc/usdt", "BTC/", "/USDT", "BTC/USDT/X", "BTC/US DT", "BTC';--/USDT"] {
        assert!(input.parse::<Symbol>().is_err(), "{} should be rejected", input);
    }
}

#[test]
fn test_serde_uses_the_string_form() {
    let symbol = Symbol::new("ETH", "USDT").expect("valid symbol");
    let json = serde_json::to_string(&symbol).expect("serialize");
    assert_eq!(json, "\"ETH/USDT\"");

    let back: Symbol = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, symbol);
    assert!(serde_json::from_str::<Symbol>("\"eth\"").is_err());
}
